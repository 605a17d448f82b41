use std::fs::File;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use refdata_domain::{
    validate_field, validate_relative_path, ManifestError, ManifestField, ManifestRecord,
    MismatchField,
};
use tracing::{debug, info, warn};

use super::ManifestLedger;
use crate::hasher::{hash_reader, FileDigest};
use crate::store::{BlobLookup, BlobMetadata, BlobStore};

/// Adds and removes records, uploading new files exactly once.
pub struct ManifestWriter {
    ledger: ManifestLedger,
}

impl ManifestWriter {
    pub fn open(path: impl AsRef<Path>, store: Arc<dyn BlobStore>) -> Result<Self, ManifestError> {
        Ok(Self {
            ledger: ManifestLedger::open(path, store)?,
        })
    }

    /// Tracks `local_file` under `name`.
    ///
    /// A remote object that already exists must match the local file; it is
    /// reused instead of uploaded again. Otherwise the file is uploaded and
    /// the store is asked to confirm what it now holds before the record is
    /// written.
    pub fn add_file(
        &mut self,
        name: &str,
        local_file: &Path,
        local_path: &str,
        remote_path: &str,
        notes: &str,
    ) -> Result<ManifestRecord, ManifestError> {
        if self.ledger.contains(name) {
            return Err(ManifestError::KeyAlreadyExists {
                name: name.to_string(),
                manifest: self.ledger.manifest().path().to_path_buf(),
            });
        }
        validate_field(ManifestField::Name, name)?;
        validate_relative_path(ManifestField::LocalPath, local_path)?;
        validate_field(ManifestField::RemotePath, remote_path)?;
        validate_field(ManifestField::Notes, notes)?;

        let digest = digest_local_file(name, local_file)?;
        debug!(
            path = %local_file.display(),
            size = digest.size,
            md5sum = %digest.md5sum,
            "hashed local file"
        );
        self.ensure_uploaded(remote_path, local_file, &digest)?;

        let record = ManifestRecord {
            name: name.to_string(),
            local_path: local_path.to_string(),
            remote_path: remote_path.to_string(),
            md5sum: digest.md5sum,
            size: digest.size,
            notes: notes.to_string(),
        };
        self.ledger.manifest_mut().insert(record.clone())?;
        if let Err(err) = self.ledger.save() {
            let _ = self.ledger.manifest_mut().remove(name);
            return Err(err);
        }
        info!(record = name, remote = %self.ledger.store().location(remote_path), "added record");
        Ok(record)
    }

    /// Drops the record for `name`. Neither the local copy nor the remote
    /// object is touched.
    pub fn remove_file(&mut self, name: &str) -> Result<ManifestRecord, ManifestError> {
        let (index, record) = self.ledger.manifest_mut().remove(name)?;
        if let Err(err) = self.ledger.save() {
            self.ledger.manifest_mut().restore(index, record);
            return Err(err);
        }
        info!(record = name, "removed record");
        Ok(record)
    }

    fn ensure_uploaded(
        &self,
        remote_path: &str,
        local_file: &Path,
        digest: &FileDigest,
    ) -> Result<(), ManifestError> {
        let store = self.ledger.store();
        let location = store.location(remote_path);
        let remote_err = |err: anyhow::Error| ManifestError::Remote {
            location: location.clone(),
            source: err.into(),
        };

        match store.metadata(remote_path).map_err(remote_err)? {
            BlobLookup::Found(existing) => {
                if let Some((field, remote, local)) = conflict(&existing, digest) {
                    return Err(ManifestError::FileAlreadyExists {
                        location,
                        field,
                        remote,
                        local,
                    });
                }
                warn!(location = %location, "remote object already present, not uploading");
                Ok(())
            }
            BlobLookup::NotFound => {
                info!(source = %local_file.display(), dest = %location, "uploading");
                store.upload(remote_path, local_file).map_err(remote_err)?;
                match store.metadata(remote_path).map_err(remote_err)? {
                    BlobLookup::Found(uploaded) => match conflict(&uploaded, digest) {
                        Some((field, remote, local)) => Err(ManifestError::UploadInconsistent {
                            location,
                            detail: format!("{field} '{remote}' vs '{local}' for the local file"),
                        }),
                        None => Ok(()),
                    },
                    BlobLookup::NotFound => Err(ManifestError::UploadInconsistent {
                        location,
                        detail: "object not found after upload".to_string(),
                    }),
                }
            }
        }
    }
}

impl Deref for ManifestWriter {
    type Target = ManifestLedger;

    fn deref(&self) -> &Self::Target {
        &self.ledger
    }
}

fn digest_local_file(name: &str, local_file: &Path) -> Result<FileDigest, ManifestError> {
    let mut file = File::open(local_file).map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => ManifestError::MissingFile {
            name: name.to_string(),
            path: local_file.to_path_buf(),
        },
        _ => ManifestError::io(local_file, err),
    })?;
    if file
        .metadata()
        .map_err(|err| ManifestError::io(local_file, err))?
        .is_dir()
    {
        return Err(ManifestError::MissingFile {
            name: name.to_string(),
            path: local_file.to_path_buf(),
        });
    }
    hash_reader(&mut file).map_err(|err| ManifestError::io(local_file, err))
}

/// Stand-in for the checksum of a remote object that reports none.
const NO_CHECKSUM: &str = "(none)";

/// First attribute where the remote object disagrees with the local digest.
/// An object without a checksum can not be shown to hold the same bytes, so
/// it always conflicts.
fn conflict(remote: &BlobMetadata, local: &FileDigest) -> Option<(MismatchField, String, String)> {
    let remote_md5sum = remote.md5sum.as_deref().unwrap_or(NO_CHECKSUM);
    if remote_md5sum != local.md5sum {
        return Some((
            MismatchField::Md5sum,
            remote_md5sum.to_string(),
            local.md5sum.clone(),
        ));
    }
    if remote.size != local.size {
        return Some((
            MismatchField::Size,
            remote.size.to_string(),
            local.size.to_string(),
        ));
    }
    None
}
