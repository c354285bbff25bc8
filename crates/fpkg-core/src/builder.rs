use crate::script::generate_pre_install;
use crate::CoreError;
use fpkg_archive::{file_sha256, hex_digest, EntryKind, WalkEntry, WalkError, Walker};
use fpkg_schema::{
    Config, Manifest, ManifestDep, ManifestDirectory, ManifestFile, Perm, DEFAULT_ARCH,
    PACKAGE_PREFIX, PRE_INSTALL_HOOK,
};
use std::path::Path;
use tracing::{debug, info};

/// Builds a `Manifest` from a validated configuration and a stream of walk
/// entries.
pub struct ManifestBuilder<'a> {
    config: &'a Config,
}

struct Attributes {
    uname: String,
    gname: String,
    perm: Perm,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Manifest with every metadata field filled and no files yet.
    pub fn metadata(&self) -> Manifest {
        let config = self.config;

        let deps = config
            .dependencies()
            .iter()
            .map(|dep| {
                let origin = dep.origin.clone().unwrap_or_else(|| dep.name.clone());
                (
                    dep.name.clone(),
                    ManifestDep {
                        origin,
                        version: dep.version.clone(),
                    },
                )
            })
            .collect();

        let mut manifest = Manifest {
            name: config.name().to_owned(),
            version: config.version().to_owned(),
            comment: config.short_description().to_owned(),
            desc: config
                .long_description()
                .map_or_else(|| sentence(config.short_description()), str::to_owned),
            origin: config
                .origin()
                .map_or_else(|| format!("misc/{}", config.name()), str::to_owned),
            www: config.website_uri().to_owned(),
            maintainer: config.maintainer().to_owned(),
            arch: config.architecture().unwrap_or(DEFAULT_ARCH).to_owned(),
            deps,
            users: config.users().iter().map(|u| u.name.clone()).collect(),
            groups: config.groups().iter().map(|g| g.name.clone()).collect(),
            prefix: PACKAGE_PREFIX.to_owned(),
            ..Manifest::default()
        };

        if let Some(script) = generate_pre_install(config.groups(), config.users()) {
            manifest.scripts.insert(PRE_INSTALL_HOOK.to_owned(), script);
        }

        manifest
    }

    /// Consume walk entries and return the finished manifest.
    ///
    /// Stops at the first walk or checksum error.
    pub fn build<I>(&self, entries: I) -> Result<Manifest, CoreError>
    where
        I: IntoIterator<Item = Result<WalkEntry, WalkError>>,
    {
        let mut manifest = self.metadata();

        for entry in entries {
            let entry = entry?;
            let attrs = self.resolve(&entry);
            match entry.kind {
                EntryKind::File => {
                    let sum = hex_digest(&file_sha256(&entry.full_path)?);
                    debug!("file {} {} {}:{} {sum}", entry.path, attrs.perm, attrs.uname, attrs.gname);
                    manifest.files.insert(
                        entry.path,
                        ManifestFile {
                            uname: attrs.uname,
                            gname: attrs.gname,
                            perm: attrs.perm,
                            sum,
                        },
                    );
                }
                EntryKind::Directory => {
                    debug!("directory {} {} {}:{}", entry.path, attrs.perm, attrs.uname, attrs.gname);
                    manifest.directories.insert(
                        entry.path,
                        ManifestDirectory {
                            uname: attrs.uname,
                            gname: attrs.gname,
                            perm: attrs.perm,
                        },
                    );
                }
            }
        }

        Ok(manifest)
    }

    fn resolve(&self, entry: &WalkEntry) -> Attributes {
        let rule = self.config.find_rule(&entry.path);
        if rule.is_some() {
            debug!("{} matched a file rule", entry.path);
        }
        let uname = rule
            .and_then(|r| r.owner.as_deref())
            .unwrap_or(self.config.file_owner());
        let gname = rule
            .and_then(|r| r.group.as_deref())
            .unwrap_or(self.config.file_group());
        let perm = rule
            .and_then(|r| r.mode.clone())
            .unwrap_or_else(|| Perm::from_mode(entry.mode));
        Attributes {
            uname: uname.to_owned(),
            gname: gname.to_owned(),
            perm,
        }
    }
}

/// Walk `root` and build its manifest.
pub fn build_manifest(config: &Config, root: &Path) -> Result<Manifest, CoreError> {
    info!("generating manifest for {} from {}", config.name(), root.display());
    let manifest = ManifestBuilder::new(config).build(Walker::new(root))?;
    info!(
        "manifest has {} files and {} directories",
        manifest.files.len(),
        manifest.directories.len()
    );
    Ok(manifest)
}

/// Capitalize the first character and end with a period.
fn sentence(s: &str) -> String {
    let mut chars = s.chars();
    let mut out = String::with_capacity(s.len() + 1);
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
    out.push('.');
    out
}
