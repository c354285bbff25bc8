pub mod build;
pub mod completions;
pub mod manifest;

use fpkg_core::CoreError;
use fpkg_schema::{load_config_file, Config};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_ARCHIVE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Load and validate the configuration, applying a `--package-version`
/// override before validation.
pub fn load_config(path: &Path, version: Option<&str>) -> Result<Config, String> {
    debug!("loading configuration from {}", path.display());
    load_config_file(path, version).map_err(|e| CoreError::from(e).to_string())
}

/// Exit code for an error message produced by a command.
pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("configuration error:") {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("archive error:")
        || msg.starts_with("walk error:")
        || msg.starts_with("checksum error:")
    {
        EXIT_ARCHIVE_ERROR
    } else {
        EXIT_FAILURE
    }
}
