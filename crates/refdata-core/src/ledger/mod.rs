//! The manifest ledger bound to a file on disk and a remote store.
//!
//! Opening takes the manifest lock only long enough to read and parse the
//! file. Writes take it again, and refuse to touch the file when its bytes
//! no longer hash to what was read (someone else wrote in between).

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use refdata_domain::{
    md5_bytes, parse_manifest, render_manifest, validate_relative_path, Manifest, ManifestError,
    ManifestField, ManifestRecord,
};
use tracing::debug;

use crate::hasher::hash_stream;
use crate::lock::{LockAccess, ManifestLock};
use crate::store::BlobStore;

mod reader;
mod writer;

#[cfg(test)]
mod testing;

pub use reader::{ManifestReader, SyncSummary, VerifySummary};
pub use writer::ManifestWriter;

/// State shared by readers and writers.
pub struct ManifestLedger {
    manifest: Manifest,
    observed_md5sum: String,
    store: Arc<dyn BlobStore>,
    local_prefix: PathBuf,
}

impl ManifestLedger {
    pub fn open(path: impl AsRef<Path>, store: Arc<dyn BlobStore>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let (manifest, observed_md5sum) = load(path)?;
        debug!(
            manifest = %path.display(),
            records = manifest.len(),
            md5sum = %observed_md5sum,
            "loaded manifest"
        );
        Ok(Self {
            manifest,
            observed_md5sum,
            store,
            local_prefix: PathBuf::from("."),
        })
    }

    /// Base directory `local_path` resolves against in [`Self::local_path`].
    #[must_use]
    pub fn with_local_prefix(mut self, local_prefix: impl Into<PathBuf>) -> Self {
        self.local_prefix = local_prefix.into();
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Column order the file is written back with.
    pub fn header(&self) -> &[ManifestField] {
        self.manifest.header()
    }

    pub fn get(&self, name: &str) -> Option<&ManifestRecord> {
        self.manifest.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.manifest.contains(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &ManifestRecord> {
        self.manifest.records()
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// Checksum of the manifest bytes as last read or written.
    pub fn observed_md5sum(&self) -> &str {
        &self.observed_md5sum
    }

    pub fn local_prefix(&self) -> &Path {
        &self.local_prefix
    }

    pub fn store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    /// Where the named record lives below the configured local prefix.
    pub fn local_path(&self, name: &str) -> Result<PathBuf, ManifestError> {
        let record = self.get(name).ok_or_else(|| ManifestError::KeyNotFound {
            name: name.to_string(),
            manifest: self.manifest.path().to_path_buf(),
        })?;
        resolve_local(&self.local_prefix, record)
    }

    pub(crate) fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Writes the in-memory records back, provided nobody else changed the
    /// file since it was read.
    pub(crate) fn save(&mut self) -> Result<(), ManifestError> {
        let path = self.manifest.path().to_path_buf();
        let io_err = |err: std::io::Error| ManifestError::io(&path, err);

        let mut lock = ManifestLock::acquire(&path, LockAccess::ReadWrite)?;
        let file = lock.file_mut();
        let on_disk = hash_stream(file).map_err(io_err)?;
        if on_disk != self.observed_md5sum {
            return Err(ManifestError::ConcurrentModification {
                manifest: path.clone(),
                observed: self.observed_md5sum.clone(),
                on_disk,
            });
        }

        let rendered = render_manifest(&self.manifest);
        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        file.write_all(rendered.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        self.observed_md5sum = hash_stream(file).map_err(io_err)?;
        debug!(
            manifest = %path.display(),
            records = self.manifest.len(),
            md5sum = %self.observed_md5sum,
            "saved manifest"
        );
        Ok(())
    }
}

/// `base/local_path` for `record`, refusing local paths that climb out of
/// `base`. Manifests may be edited by hand, so this is checked on every use
/// and not only when a record is added.
pub(crate) fn resolve_local(
    base: &Path,
    record: &ManifestRecord,
) -> Result<PathBuf, ManifestError> {
    validate_relative_path(ManifestField::LocalPath, &record.local_path)?;
    Ok(base.join(&record.local_path))
}

fn load(path: &Path) -> Result<(Manifest, String), ManifestError> {
    let mut lock = ManifestLock::acquire(path, LockAccess::Read)?;
    let mut bytes = Vec::new();
    lock.file_mut()
        .read_to_end(&mut bytes)
        .map_err(|err| ManifestError::io(path, err))?;
    let observed = md5_bytes(&bytes);
    let text = String::from_utf8(bytes).map_err(|err| {
        let valid = &err.as_bytes()[..err.utf8_error().valid_up_to()];
        let line = valid.iter().filter(|byte| **byte == b'\n').count() + 1;
        ManifestError::Parse {
            manifest: path.to_path_buf(),
            line,
            reason: "manifest is not valid UTF-8".to_string(),
        }
    })?;
    let manifest = parse_manifest(path, &text)?;
    Ok((manifest, observed))
}
