//! Text encoding of content checksums.
//!
//! Records carry the MD5 digest of a file as standard, padded base64. This is
//! the representation object stores such as Google Cloud Storage report in
//! their `md5Hash` metadata, so local and remote values compare directly.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use md5::{Digest, Md5};

/// Encodes a raw MD5 digest in the ledger representation.
pub fn encode_md5(digest: &[u8]) -> String {
    BASE64_STANDARD.encode(digest)
}

/// Checksum of an in-memory buffer.
pub fn md5_bytes(bytes: &[u8]) -> String {
    encode_md5(&Md5::digest(bytes))
}
