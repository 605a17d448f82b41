use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;
use refdata_domain::ManifestError;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LockAccess {
    Read,
    ReadWrite,
}

/// Exclusive advisory lock on the manifest file, held until dropped.
#[derive(Debug)]
pub(crate) struct ManifestLock {
    file: File,
    path: PathBuf,
}

impl ManifestLock {
    /// Opens `path` and blocks until the exclusive lock is granted.
    pub(crate) fn acquire(path: &Path, access: LockAccess) -> Result<Self, ManifestError> {
        let file = OpenOptions::new()
            .read(true)
            .write(access == LockAccess::ReadWrite)
            .open(path)
            .map_err(|err| ManifestError::io(path, err))?;
        file.lock_exclusive()
            .map_err(|err| ManifestError::io(path, err))?;
        debug!(manifest = %path.display(), ?access, "manifest locked");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl Drop for ManifestLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!(manifest = %self.path.display(), %err, "failed to unlock manifest");
        } else {
            debug!(manifest = %self.path.display(), "manifest unlocked");
        }
    }
}
