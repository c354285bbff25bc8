//! Package configuration and manifest model for fpkg.
//!
//! This crate defines the schema layer: YAML configuration decoding
//! (`ConfigFile`), the explicit validation pass producing an immutable
//! `Config` with compiled file rules, and the `Manifest` written as
//! `+MANIFEST` into FreeBSD packages.

pub mod config;
pub mod manifest;
pub mod types;

pub use config::{
    load_config_file, parse_config_file, parse_config_str, Config, ConfigError, ConfigFile,
    Dependency, DependencySection, FileDefaults, FileRule, FileRuleSection, Group, GroupSection,
    PathMatcher, User, UserSection, DEFAULT_FILE_GROUP, DEFAULT_FILE_OWNER,
};
pub use manifest::{
    parse_manifest_str, Manifest, ManifestDep, ManifestDirectory, ManifestError, ManifestFile,
    DEFAULT_ARCH, MANIFEST_ENTRY_NAME, PACKAGE_EXTENSION, PACKAGE_PREFIX, PRE_INSTALL_HOOK,
};
pub use types::{Checksum, Perm, MAX_MODE};
