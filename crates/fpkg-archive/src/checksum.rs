use crate::ChecksumError;
use fpkg_schema::Checksum;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Raw SHA-256 digest bytes.
pub type Sha256Sum = sha2::digest::Output<Sha256>;

/// Stream the whole file at `path` through SHA-256.
pub fn file_sha256(path: &Path) -> Result<Sha256Sum, ChecksumError> {
    let wrap = |source| ChecksumError {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(wrap)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(wrap)?;
    Ok(hasher.finalize())
}

pub fn bytes_sha256(data: &[u8]) -> Sha256Sum {
    Sha256::digest(data)
}

/// Lowercase hex form stored in the manifest `sum` field.
pub fn hex_digest(sum: &Sha256Sum) -> Checksum {
    Checksum::new(format!("{sum:x}"))
}
