use super::{json_pretty, load_config, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use fpkg_core::{BuildOptions, Engine};
use std::path::{Path, PathBuf};

pub fn run(
    directory: &Path,
    config_path: &Path,
    version: Option<&str>,
    output_dir: &Path,
    manifest_path: Option<PathBuf>,
    json: bool,
) -> Result<u8, String> {
    let config = load_config(config_path, version)?;
    let engine = Engine::new(directory);

    let pb = if json {
        None
    } else {
        Some(spinner(&format!(
            "building {}-{}...",
            config.name(),
            config.version()
        )))
    };
    let options = BuildOptions {
        output_dir: output_dir.to_path_buf(),
        manifest_path,
        mtime: None,
    };

    let result = match engine.build(&config, &options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "package built");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "build failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        let payload = serde_json::json!({
            "archive": result.archive_path,
            "manifest": result.manifest_path,
            "name": result.manifest.name,
            "version": result.manifest.version,
            "files": result.manifest.files.len(),
            "directories": result.manifest.directories.len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{}", result.archive_path.display());
    }
    Ok(EXIT_SUCCESS)
}
