use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;
use url::Url;

use super::{join_remote, BlobLookup, BlobMetadata, BlobStore};
use crate::hasher::hash_file;

/// Blobs stored as plain files below a root directory.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Accepts `file:///abs/dir/` or a bare path.
    pub fn new(prefix: &str) -> Result<Self> {
        let root = if prefix.starts_with("file://") {
            let url =
                Url::parse(prefix).with_context(|| format!("invalid remote prefix {prefix}"))?;
            url.to_file_path()
                .map_err(|()| anyhow!("remote prefix {prefix} is not a local path"))?
        } else {
            PathBuf::from(prefix)
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, relative_path: &str) -> Result<PathBuf> {
        let relative = Path::new(relative_path.trim_start_matches('/'));
        if relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir))
        {
            bail!("remote path '{relative_path}' escapes the store root");
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn location(&self, relative_path: &str) -> String {
        let root = self.root.display().to_string();
        match Url::from_directory_path(&self.root) {
            Ok(url) => join_remote(url.as_str(), relative_path),
            Err(()) => join_remote(&root, relative_path),
        }
    }

    fn metadata(&self, relative_path: &str) -> Result<BlobLookup> {
        let path = self.object_path(relative_path)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(BlobLookup::NotFound),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BlobLookup::NotFound),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to stat {}", path.display()))
            }
        }
        let digest =
            hash_file(&path).with_context(|| format!("failed to hash {}", path.display()))?;
        Ok(BlobLookup::Found(BlobMetadata {
            md5sum: Some(digest.md5sum),
            size: digest.size,
        }))
    }

    fn upload(&self, relative_path: &str, local_file: &Path) -> Result<()> {
        let dest = self.object_path(relative_path)?;
        let parent = dest
            .parent()
            .ok_or_else(|| anyhow!("remote path '{relative_path}' has no parent directory"))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        let mut source = File::open(local_file)
            .with_context(|| format!("failed to open {}", local_file.display()))?;
        let mut staged = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to stage upload in {}", parent.display()))?;
        io::copy(&mut source, staged.as_file_mut())
            .with_context(|| format!("failed to copy {}", local_file.display()))?;
        staged
            .persist(&dest)
            .with_context(|| format!("failed to store {}", dest.display()))?;
        debug!(dest = %dest.display(), "stored blob");
        Ok(())
    }

    fn download(&self, relative_path: &str, dest: &Path) -> Result<()> {
        let source = self.object_path(relative_path)?;
        fs::copy(&source, dest).with_context(|| {
            format!("failed to copy {} to {}", source.display(), dest.display())
        })?;
        Ok(())
    }

    fn delete(&self, relative_path: &str) -> Result<()> {
        let path = self.object_path(relative_path)?;
        fs::remove_file(&path).with_context(|| format!("failed to delete {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn upload_download_and_delete() -> Result<()> {
        let tmp = tempdir()?;
        let store = LocalBlobStore::new(&tmp.path().join("remote").display().to_string())?;
        let source = tmp.path().join("eight_As.fa");
        fs::write(&source, b"AAAAAAAA")?;

        assert_eq!(store.metadata("ref/eight_As.fa")?, BlobLookup::NotFound);
        store.upload("ref/eight_As.fa", &source)?;
        assert!(store.exists("ref/eight_As.fa")?);
        match store.metadata("ref/eight_As.fa")? {
            BlobLookup::Found(meta) => {
                assert_eq!(meta.size, 8);
                assert_eq!(
                    meta.md5sum.as_deref(),
                    Some(refdata_domain::md5_bytes(b"AAAAAAAA").as_str())
                );
            }
            BlobLookup::NotFound => panic!("uploaded blob should exist"),
        }

        let copy = tmp.path().join("copy.fa");
        store.download("ref/eight_As.fa", &copy)?;
        assert_eq!(fs::read(&copy)?, b"AAAAAAAA");

        store.delete("ref/eight_As.fa")?;
        assert!(!store.exists("ref/eight_As.fa")?);
        Ok(())
    }

    #[test]
    fn file_url_prefix_resolves_to_directory() -> Result<()> {
        let tmp = tempdir()?;
        let url = Url::from_directory_path(tmp.path()).map_err(|()| anyhow!("bad tmp path"))?;
        let store = LocalBlobStore::new(url.as_str())?;
        assert_eq!(store.root(), tmp.path());
        assert_eq!(store.location("a/b.fa"), format!("{url}a/b.fa"));
        Ok(())
    }

    #[test]
    fn parent_components_are_rejected() -> Result<()> {
        let tmp = tempdir()?;
        let store = LocalBlobStore::new(&tmp.path().display().to_string())?;
        assert!(store.metadata("../outside.fa").is_err());
        Ok(())
    }
}
