#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod commands;
pub mod config;
mod context;
mod errors;
pub mod hasher;
pub mod ledger;
mod lock;
mod outcome;
pub mod store;

pub use commands::{
    manifest_add, manifest_init, manifest_list, manifest_remove, manifest_sync, manifest_verify,
    AddRequest, InitRequest, ListRequest, RemoveRequest, SyncRequest, VerifyRequest,
};
pub use config::{Config, GlobalOptions};
pub use context::CommandContext;
pub use errors::{
    internal_error_outcome, manifest_error_outcome, missing_manifest_outcome, remote_prefix_outcome,
};
pub use hasher::{hash_file, hash_stream, FileDigest};
pub use ledger::{ManifestLedger, ManifestReader, ManifestWriter, SyncSummary, VerifySummary};
pub use outcome::{status_line, CommandGroup, CommandStatus, ExecutionOutcome};
pub use refdata_domain::{ManifestError, ManifestRecord, MismatchField};
pub use store::{open_store, BlobLookup, BlobMetadata, BlobStore, StoreConfig};
