use std::fs;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use refdata_domain::{ManifestError, ManifestRecord, MismatchField};
use serde::Serialize;
use tracing::{debug, info};

use super::{resolve_local, ManifestLedger};
use crate::hasher::hash_file;
use crate::store::BlobStore;

/// Read-only access: materialise and check local copies.
pub struct ManifestReader {
    ledger: ManifestLedger,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub verified: usize,
    pub checksums: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub downloaded: Vec<String>,
    pub verified: Vec<String>,
}

impl ManifestReader {
    pub fn open(path: impl AsRef<Path>, store: Arc<dyn BlobStore>) -> Result<Self, ManifestError> {
        Ok(Self {
            ledger: ManifestLedger::open(path, store)?,
        })
    }

    #[must_use]
    pub fn with_local_prefix(self, local_prefix: impl Into<PathBuf>) -> Self {
        Self {
            ledger: self.ledger.with_local_prefix(local_prefix),
        }
    }

    /// Checks every record's local copy below `local_base`, stopping at the
    /// first one that is missing or differs. Sizes are always compared;
    /// checksums only when `check_checksums` is set.
    pub fn verify(
        &self,
        local_base: &Path,
        check_checksums: bool,
    ) -> Result<VerifySummary, ManifestError> {
        let mut summary = VerifySummary {
            verified: 0,
            checksums: check_checksums,
        };
        for record in self.ledger.records() {
            let local = resolve_local(local_base, record)?;
            verify_record(record, &local, check_checksums)?;
            summary.verified += 1;
        }
        Ok(summary)
    }

    /// Downloads every record missing below `local_base` and verifies the
    /// ones already present, including their checksums.
    pub fn sync(&self, local_base: &Path) -> Result<SyncSummary, ManifestError> {
        self.sync_with(local_base, true)
    }

    pub fn sync_with(
        &self,
        local_base: &Path,
        check_checksums: bool,
    ) -> Result<SyncSummary, ManifestError> {
        let mut summary = SyncSummary::default();
        for record in self.ledger.records() {
            let local = resolve_local(local_base, record)?;
            if local.exists() {
                verify_record(record, &local, check_checksums)?;
                summary.verified.push(record.name.clone());
            } else {
                self.fetch(record, &local)?;
                summary.downloaded.push(record.name.clone());
            }
        }
        Ok(summary)
    }

    fn fetch(&self, record: &ManifestRecord, local: &Path) -> Result<(), ManifestError> {
        let store = self.ledger.store();
        let location = store.location(&record.remote_path);
        let parent = local.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| ManifestError::io(parent, err))?;

        info!(source = %location, dest = %local.display(), "downloading");
        let partial = tempfile::Builder::new()
            .prefix(".refdata-")
            .suffix(".partial")
            .tempfile_in(parent)
            .map_err(|err| ManifestError::io(parent, err))?;
        store
            .download(&record.remote_path, partial.path())
            .map_err(|err| ManifestError::Remote {
                location: location.clone(),
                source: err.into(),
            })?;

        let size = fs::metadata(partial.path())
            .map_err(|err| ManifestError::io(partial.path(), err))?
            .len();
        if size != record.size {
            return Err(ManifestError::FileMismatch {
                name: record.name.clone(),
                path: local.to_path_buf(),
                field: MismatchField::Size,
                expected: record.size.to_string(),
                actual: size.to_string(),
            });
        }
        partial
            .persist(local)
            .map_err(|err| ManifestError::io(local, err.error))?;
        debug!(dest = %local.display(), size, "download complete");
        Ok(())
    }
}

impl Deref for ManifestReader {
    type Target = ManifestLedger;

    fn deref(&self) -> &Self::Target {
        &self.ledger
    }
}

fn verify_record(
    record: &ManifestRecord,
    local: &Path,
    check_checksums: bool,
) -> Result<(), ManifestError> {
    let missing = || ManifestError::MissingFile {
        name: record.name.clone(),
        path: local.to_path_buf(),
    };
    let meta = match fs::metadata(local) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(missing()),
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(missing()),
        Err(err) => return Err(ManifestError::io(local, err)),
    };
    let mismatch = |field, expected: String, actual: String| ManifestError::FileMismatch {
        name: record.name.clone(),
        path: local.to_path_buf(),
        field,
        expected,
        actual,
    };
    if meta.len() != record.size {
        return Err(mismatch(
            MismatchField::Size,
            record.size.to_string(),
            meta.len().to_string(),
        ));
    }
    if check_checksums {
        let digest = hash_file(local).map_err(|err| ManifestError::io(local, err))?;
        debug!(path = %local.display(), md5sum = %digest.md5sum, "hashed local copy");
        if digest.md5sum != record.md5sum {
            return Err(mismatch(
                MismatchField::Md5sum,
                record.md5sum.clone(),
                digest.md5sum,
            ));
        }
    }
    Ok(())
}
