#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod checksum;
pub mod error;
pub mod manifest;
pub mod record;

pub use checksum::{encode_md5, md5_bytes};
pub use error::{ManifestError, MismatchField};
pub use manifest::{parse_manifest, render_manifest, Manifest};
pub use record::{
    validate_field, validate_relative_path, ManifestField, ManifestRecord, DEFAULT_HEADER,
};
