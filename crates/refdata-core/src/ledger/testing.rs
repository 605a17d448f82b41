use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use crate::store::{BlobLookup, BlobMetadata, BlobStore, LocalBlobStore};

pub(crate) const HEADER: &str = "name\tlocal_path\tremote_path\tmd5sum\tsize\tnotes\n";

/// Ways the test store misbehaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fault {
    None,
    /// Uploads report success but store nothing.
    DropUploads,
    /// Uploads store different bytes of the same length.
    CorruptUploads,
    /// Metadata never carries an md5sum, like composite GCS objects.
    HideChecksums,
}

/// Local store that counts transfers.
pub(crate) struct CountingStore {
    inner: LocalBlobStore,
    fault: Fault,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
}

impl BlobStore for CountingStore {
    fn location(&self, relative_path: &str) -> String {
        self.inner.location(relative_path)
    }

    fn metadata(&self, relative_path: &str) -> Result<BlobLookup> {
        let lookup = self.inner.metadata(relative_path)?;
        Ok(match (self.fault, lookup) {
            (Fault::HideChecksums, BlobLookup::Found(meta)) => BlobLookup::Found(BlobMetadata {
                md5sum: None,
                ..meta
            }),
            (_, lookup) => lookup,
        })
    }

    fn upload(&self, relative_path: &str, local_file: &Path) -> Result<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::DropUploads => Ok(()),
            Fault::CorruptUploads => {
                let mut bytes = fs::read(local_file)?;
                for byte in &mut bytes {
                    *byte = byte.wrapping_add(1);
                }
                let staged = local_file.with_extension("corrupt");
                fs::write(&staged, bytes)?;
                self.inner.upload(relative_path, &staged)
            }
            Fault::None | Fault::HideChecksums => self.inner.upload(relative_path, local_file),
        }
    }

    fn download(&self, relative_path: &str, dest: &Path) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.download(relative_path, dest)
    }

    fn delete(&self, relative_path: &str) -> Result<()> {
        self.inner.delete(relative_path)
    }
}

pub(crate) struct Fixture {
    pub(crate) _tmp: TempDir,
    pub(crate) manifest: PathBuf,
    pub(crate) remote: PathBuf,
    pub(crate) local: PathBuf,
    sources: PathBuf,
    store: Arc<CountingStore>,
}

impl Fixture {
    /// A header-only manifest, an empty remote directory and an empty local
    /// directory.
    pub(crate) fn new() -> Result<Self> {
        Self::with_fault(Fault::None)
    }

    pub(crate) fn with_fault(fault: Fault) -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let manifest = tmp.path().join("data-manifest.tsv");
        fs::write(&manifest, HEADER)?;
        let remote = tmp.path().join("remote");
        let local = tmp.path().join("local");
        let sources = tmp.path().join("sources");
        for dir in [&remote, &local, &sources] {
            fs::create_dir_all(dir)?;
        }
        let store = Arc::new(CountingStore {
            inner: LocalBlobStore::new(&remote.display().to_string())?,
            fault,
            uploads: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        });
        Ok(Self {
            _tmp: tmp,
            manifest,
            remote,
            local,
            sources,
            store,
        })
    }

    pub(crate) fn store(&self) -> Arc<dyn BlobStore> {
        self.store.clone()
    }

    pub(crate) fn uploads(&self) -> usize {
        self.store.uploads.load(Ordering::SeqCst)
    }

    pub(crate) fn downloads(&self) -> usize {
        self.store.downloads.load(Ordering::SeqCst)
    }

    /// Writes a file outside the local prefix to add from.
    pub(crate) fn source(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.sources.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}
