//! Remote object stores addressed by a path relative to a fixed prefix.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

mod gcs;
mod local;

pub use gcs::GcsBlobStore;
pub use local::LocalBlobStore;

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// What the store reports about an existing object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobMetadata {
    /// Base64 MD5 digest; composite objects may not carry one.
    pub md5sum: Option<String>,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobLookup {
    Found(BlobMetadata),
    NotFound,
}

/// A blob store bound to one prefix.
pub trait BlobStore: Send + Sync {
    /// Absolute location of `relative_path`, used in messages and errors.
    fn location(&self, relative_path: &str) -> String;

    fn metadata(&self, relative_path: &str) -> Result<BlobLookup>;

    fn exists(&self, relative_path: &str) -> Result<bool> {
        Ok(matches!(self.metadata(relative_path)?, BlobLookup::Found(_)))
    }

    fn upload(&self, relative_path: &str, local_file: &Path) -> Result<()>;

    /// Writes the object to `dest`, replacing anything already there.
    fn download(&self, relative_path: &str, dest: &Path) -> Result<()>;

    fn delete(&self, relative_path: &str) -> Result<()>;
}

/// Settings the store adapters need beyond the prefix itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub gcs_endpoint: String,
    pub gcs_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            gcs_endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            gcs_token: None,
        }
    }
}

/// Picks the adapter for `prefix` by its scheme.
///
/// `gs://bucket/dir/` talks to Cloud Storage; `file:///dir/` and bare
/// filesystem paths use a local directory.
pub fn open_store(prefix: &str, config: &StoreConfig) -> Result<Arc<dyn BlobStore>> {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        bail!("remote prefix is empty");
    }
    match scheme(trimmed) {
        Some("gs") => Ok(Arc::new(GcsBlobStore::new(trimmed, config)?)),
        Some("file") | None => Ok(Arc::new(LocalBlobStore::new(trimmed)?)),
        Some(other) => bail!("unsupported remote prefix scheme '{other}' in '{trimmed}'"),
    }
}

fn scheme(prefix: &str) -> Option<&str> {
    let (scheme, _) = prefix.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Joins with exactly one `/` between the two parts.
pub(crate) fn join_remote(prefix: &str, relative_path: &str) -> String {
    let relative = relative_path.trim_start_matches('/');
    if prefix.is_empty() {
        return relative.to_string();
    }
    format!("{}/{relative}", prefix.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_puts_one_slash_between_parts() {
        assert_eq!(join_remote("gs://b/ref/", "a.fa"), "gs://b/ref/a.fa");
        assert_eq!(join_remote("gs://b/ref", "/a.fa"), "gs://b/ref/a.fa");
        assert_eq!(join_remote("gs://b/ref//", "dir/a.fa"), "gs://b/ref/dir/a.fa");
        assert_eq!(join_remote("", "dir/a.fa"), "dir/a.fa");
    }

    #[test]
    fn scheme_selects_adapter() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let bare = tmp.path().display().to_string();
        let store = open_store(&bare, &StoreConfig::default())?;
        assert!(store.location("a.fa").ends_with("/a.fa"));

        let store = open_store("gs://balrog/reference-data/", &StoreConfig::default())?;
        assert_eq!(
            store.location("eight_As.fa"),
            "gs://balrog/reference-data/eight_As.fa"
        );

        let err = match open_store("s3://bucket/x/", &StoreConfig::default()) {
            Ok(_) => panic!("s3 prefixes are not supported"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("unsupported"), "{err}");
        Ok(())
    }
}
