use crate::builder::ManifestBuilder;
use crate::lifecycle::{BuildState, BuildTracker};
use crate::CoreError;
use fpkg_archive::{write_package, PackageInput, WalkEntry, Walker};
use fpkg_schema::{Config, Manifest};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Environment variable overriding the timestamp stamped on archive entries.
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

const PACKAGE_MODE: u32 = 0o644;

/// Package build pipeline for one source directory.
///
/// Walks the directory, builds the manifest, and writes the package archive.
/// The archive is staged in a temporary file next to its destination and only
/// renamed into place once complete.
pub struct Engine {
    root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory receiving `<name>-<version>.pkg`.
    pub output_dir: PathBuf,
    /// Also write the manifest as a standalone file.
    pub manifest_path: Option<PathBuf>,
    /// Entry timestamp; falls back to `SOURCE_DATE_EPOCH`, then to now.
    pub mtime: Option<u64>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            manifest_path: None,
            mtime: None,
        }
    }
}

/// Result of a successful package build.
#[derive(Debug, Serialize)]
pub struct BuildResult {
    pub archive_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub manifest: Manifest,
}

impl Engine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk the source directory and return its manifest without writing
    /// anything.
    pub fn generate_manifest(&self, config: &Config) -> Result<Manifest, CoreError> {
        crate::builder::build_manifest(config, &self.root)
    }

    /// Build the package described by `config`.
    pub fn build(&self, config: &Config, options: &BuildOptions) -> Result<BuildResult, CoreError> {
        let mut tracker = BuildTracker::default();
        let result = self.run(&mut tracker, config, options);
        if let Err(e) = &result {
            warn!("build of {} failed in state {}: {e}", config.name(), tracker.state());
            tracker.fail();
        }
        result
    }

    fn run(
        &self,
        tracker: &mut BuildTracker,
        config: &Config,
        options: &BuildOptions,
    ) -> Result<BuildResult, CoreError> {
        tracker.advance(BuildState::ConfigLoaded)?;
        info!(
            "building {}-{} from {}",
            config.name(),
            config.version(),
            self.root.display()
        );

        let entries: Vec<WalkEntry> = Walker::new(&self.root).collect::<Result<_, _>>()?;
        debug!("walked {} entries", entries.len());
        tracker.advance(BuildState::Walked)?;

        let manifest = ManifestBuilder::new(config).build(entries.into_iter().map(Ok))?;
        tracker.advance(BuildState::ManifestBuilt)?;

        tracker.advance(BuildState::Archiving)?;
        let mtime = resolve_mtime(options.mtime);
        let archive_path = options.output_dir.join(manifest.package_filename());
        let staged = self.stage_archive(config, &manifest, mtime, &archive_path)?;

        // The archive only appears once every other output has been written.
        if let Some(path) = &options.manifest_path {
            manifest.write_file(path)?;
            info!("wrote manifest {}", path.display());
        }
        staged
            .persist(&archive_path)
            .map_err(|e| CoreError::Io(e.error))?;
        info!("wrote {}", archive_path.display());

        tracker.advance(BuildState::Done)?;
        Ok(BuildResult {
            archive_path,
            manifest_path: options.manifest_path.clone(),
            manifest,
        })
    }

    /// Write the archive to a temporary file next to `dest`.
    ///
    /// The file is removed when dropped; the caller persists it.
    fn stage_archive(
        &self,
        config: &Config,
        manifest: &Manifest,
        mtime: u64,
        dest: &Path,
    ) -> Result<NamedTempFile, CoreError> {
        let dir = dest.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        let input = PackageInput {
            config,
            root: &self.root,
            manifest,
            mtime,
        };
        let mut writer = write_package(BufWriter::new(tmp), &input)?;
        writer.flush()?;
        let tmp = writer.into_inner().map_err(|e| e.into_error())?;

        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(PACKAGE_MODE))?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

/// Timestamp stamped on every archive entry.
fn resolve_mtime(explicit: Option<u64>) -> u64 {
    if let Some(mtime) = explicit {
        return mtime;
    }
    if let Ok(value) = std::env::var(SOURCE_DATE_EPOCH) {
        match value.trim().parse::<u64>() {
            Ok(mtime) => return mtime,
            Err(_) => warn!("ignoring invalid {SOURCE_DATE_EPOCH} value '{value}'"),
        }
    }
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpkg_schema::parse_config_str;
    use std::io::Read;

    const CONFIG: &str = r#"
name: demo
version: "1.0"
short_description: a demo
website_uri: https://example.com
maintainer: dev@example.com
"#;

    fn config() -> Config {
        parse_config_str(CONFIG).unwrap().validate().unwrap()
    }

    fn source() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/demo"), "demo").unwrap();
        dir
    }

    fn options(out: &Path) -> BuildOptions {
        BuildOptions {
            output_dir: out.to_path_buf(),
            manifest_path: None,
            mtime: Some(1_700_000_000),
        }
    }

    #[test]
    fn build_writes_named_archive() {
        let src = source();
        let out = tempfile::tempdir().unwrap();
        let result = Engine::new(src.path())
            .build(&config(), &options(out.path()))
            .unwrap();

        assert_eq!(result.archive_path, out.path().join("demo-1.0.pkg"));
        let meta = fs::metadata(&result.archive_path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o644);

        let mut ar = tar::Archive::new(fs::File::open(&result.archive_path).unwrap());
        let names: Vec<String> = ar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["+MANIFEST", "/bin/demo"]);
    }

    #[test]
    fn explicit_mtime_is_used() {
        let src = source();
        let out = tempfile::tempdir().unwrap();
        let result = Engine::new(src.path())
            .build(&config(), &options(out.path()))
            .unwrap();
        let mut ar = tar::Archive::new(fs::File::open(&result.archive_path).unwrap());
        for entry in ar.entries().unwrap() {
            assert_eq!(entry.unwrap().header().mtime().unwrap(), 1_700_000_000);
        }
    }

    #[test]
    fn manifest_file_is_written_on_request() {
        let src = source();
        let out = tempfile::tempdir().unwrap();
        let manifest_path = out.path().join("manifest.json");
        let opts = BuildOptions {
            manifest_path: Some(manifest_path.clone()),
            ..options(out.path())
        };
        let result = Engine::new(src.path()).build(&config(), &opts).unwrap();

        let mut content = String::new();
        fs::File::open(&manifest_path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.ends_with('\n'));
        let parsed = fpkg_schema::parse_manifest_str(&content).unwrap();
        assert_eq!(parsed, result.manifest);
    }

    #[test]
    fn missing_source_leaves_no_output() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let err = Engine::new(src.path().join("missing"))
            .build(&config(), &options(out.path()))
            .unwrap_err();
        assert!(matches!(err, CoreError::Walk(_)));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn output_directory_is_created() {
        let src = source();
        let out = tempfile::tempdir().unwrap();
        let nested = out.path().join("a/b");
        let result = Engine::new(src.path())
            .build(&config(), &options(&nested))
            .unwrap();
        assert!(result.archive_path.starts_with(&nested));
        assert!(result.archive_path.is_file());
    }

    #[test]
    fn generate_manifest_writes_nothing() {
        let src = source();
        let before = fs::read_dir(src.path()).unwrap().count();
        let manifest = Engine::new(src.path()).generate_manifest(&config()).unwrap();
        assert!(manifest.files.contains_key("/bin/demo"));
        assert_eq!(fs::read_dir(src.path()).unwrap().count(), before);
    }

    #[test]
    fn explicit_mtime_wins_over_environment() {
        assert_eq!(resolve_mtime(Some(42)), 42);
    }
}
