//! The `+MANIFEST` package descriptor.
//!
//! FreeBSD `pkg(8)` reads manifests in UCL, which is a superset of JSON, so the
//! manifest is emitted as plain JSON. Field names follow `libpkg/pkg_manifest.c`.

use crate::types::{Checksum, Perm};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Name of the manifest entry inside a package archive.
pub const MANIFEST_ENTRY_NAME: &str = "+MANIFEST";
/// Extension of package archives.
pub const PACKAGE_EXTENSION: &str = "pkg";
/// Script key for the hook run before files are installed.
pub const PRE_INSTALL_HOOK: &str = "pre-install";
/// Architecture used when none is configured. `pkg add` crashes on a
/// manifest without an `arch` field.
pub const DEFAULT_ARCH: &str = "*";
/// Installation prefix; manifest paths are absolute.
pub const PACKAGE_PREFIX: &str = "/";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to write manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode manifest: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub www: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub maintainer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deps: BTreeMap<String, ManifestDep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, ManifestFile>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directories: BTreeMap<String, ManifestDirectory>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestDep {
    pub origin: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestFile {
    pub uname: String,
    pub gname: String,
    pub perm: Perm,
    pub sum: Checksum,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestDirectory {
    pub uname: String,
    pub gname: String,
    pub perm: Perm,
}

impl Manifest {
    /// `<name>-<version>.pkg`
    pub fn package_filename(&self) -> String {
        format!("{}-{}.{PACKAGE_EXTENSION}", self.name, self.version)
    }

    pub fn pre_install_script(&self) -> Option<&str> {
        self.scripts.get(PRE_INSTALL_HOOK).map(String::as_str)
    }

    /// Single-line encoding stored as the archive's `+MANIFEST` entry.
    pub fn to_compact_json(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_pretty_json(&self) -> Result<String, ManifestError> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        Ok(content)
    }

    /// Write the manifest as a standalone file, replacing `path` atomically.
    pub fn write_file(&self, path: &Path) -> Result<(), ManifestError> {
        let content = self.to_pretty_json()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ManifestError::Io(e.error))?;
        Ok(())
    }
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    Ok(serde_json::from_str(input)?)
}
