//! Size and checksum computation for tracked files.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use md5::{Digest, Md5};
use refdata_domain::encode_md5;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    pub md5sum: String,
    pub size: u64,
}

/// Hashes the file at `path`.
pub fn hash_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = File::open(path)?;
    hash_reader(&mut file)
}

/// Hashes everything remaining in `reader`.
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<FileDigest> {
    let mut hasher = Md5::new();
    let mut buf = vec![0_u8; CHUNK_SIZE];
    let mut size: u64 = 0;
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..read]);
        size += read as u64;
    }
    Ok(FileDigest {
        md5sum: encode_md5(&hasher.finalize()),
        size,
    })
}

/// Checksum of the full content of `stream`, from offset zero.
///
/// The stream position is restored before returning, including when hashing
/// fails part way.
pub fn hash_stream<S: Read + Seek>(stream: &mut S) -> io::Result<String> {
    let position = stream.stream_position()?;
    stream.seek(SeekFrom::Start(0))?;
    let digest = hash_reader(stream);
    stream.seek(SeekFrom::Start(position))?;
    Ok(digest?.md5sum)
}
