use super::{load_config, EXIT_SUCCESS};
use fpkg_core::Engine;
use std::path::Path;

/// Print the manifest for `directory`, or write it to `output`.
pub fn run(
    directory: &Path,
    config_path: &Path,
    version: Option<&str>,
    output: Option<&Path>,
) -> Result<u8, String> {
    let config = load_config(config_path, version)?;
    let manifest = Engine::new(directory)
        .generate_manifest(&config)
        .map_err(|e| e.to_string())?;

    match output {
        Some(path) => {
            manifest
                .write_file(path)
                .map_err(|e| format!("manifest error: {e}"))?;
            println!("{}", path.display());
        }
        None => {
            let content = manifest
                .to_pretty_json()
                .map_err(|e| format!("manifest error: {e}"))?;
            print!("{content}");
        }
    }
    Ok(EXIT_SUCCESS)
}
