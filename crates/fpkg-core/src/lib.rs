//! Package build pipeline for fpkg.
//!
//! This crate ties together the configuration schema and the filesystem layer
//! into the `Engine`: it walks a source directory, resolves per-file ownership
//! and permission overrides into a `Manifest`, renders the pre-install script
//! for user and group provisioning, and writes the package archive. Build
//! progress is tracked by a small validated state machine.

pub mod builder;
pub mod engine;
pub mod lifecycle;
pub mod script;

pub use builder::{build_manifest, ManifestBuilder};
pub use engine::{BuildOptions, BuildResult, Engine, SOURCE_DATE_EPOCH};
pub use lifecycle::{validate_transition, BuildState, BuildTracker};
pub use script::generate_pre_install;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] fpkg_schema::ConfigError),
    #[error("manifest error: {0}")]
    Manifest(#[from] fpkg_schema::ManifestError),
    #[error("walk error: {0}")]
    Walk(#[from] fpkg_archive::WalkError),
    #[error("checksum error: {0}")]
    Checksum(#[from] fpkg_archive::ChecksumError),
    #[error("archive error: {0}")]
    Archive(#[from] fpkg_archive::ArchiveError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
