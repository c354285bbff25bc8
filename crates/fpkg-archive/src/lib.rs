//! Filesystem side of fpkg: directory walking, content checksums, and
//! package archive writing.
//!
//! The `Walker` turns a source tree into a deterministic stream of rooted
//! paths, `file_sha256` hashes file content, and `write_package` serializes a
//! manifest and the files it describes into an uncompressed tar stream
//! readable by `pkg(8)`.

pub mod checksum;
pub mod package;
pub mod walk;

pub use checksum::{bytes_sha256, file_sha256, hex_digest, Sha256Sum};
pub use package::{write_package, PackageInput};
pub use walk::{rooted_to_host, EntryKind, WalkEntry, Walker};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("cannot walk {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

#[derive(Debug, Error)]
#[error("cannot compute checksum of {}: {source}", path.display())]
pub struct ChecksumError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot encode manifest: {0}")]
    Manifest(#[from] fpkg_schema::ManifestError),
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("content of {} changed since the manifest was generated", .0.display())]
    ContentChanged(PathBuf),
    #[error("cannot parse permission string '{perm}' of {entry}")]
    InvalidPermission { entry: String, perm: String },
    #[error("cannot write archive entry {entry}: {source}")]
    Write {
        entry: String,
        source: std::io::Error,
    },
    #[error("cannot finalize archive: {0}")]
    Finish(#[source] std::io::Error),
}
