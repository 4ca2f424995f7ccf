//! Logging initialization.
//!
//! Logs go to stderr so command output on stdout stays clean, or to a file
//! when `--log-file` is given. `RUST_LOG` overrides the level.

use std::path::PathBuf;
use tracing::Level;
use vio_util::log::LogConfig;

/// Initialize logging for the CLI.
///
/// `log_file` is the value of `--log-file`: `None` when the flag is absent,
/// an empty path when it was given without a value (use the default location).
/// Returns the file logs are written to, if any.
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Option<PathBuf> {
    let mut config = if verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    config.file = match log_file {
        Some(path) if path.as_os_str().is_empty() => vio_util::log::default_log_path(),
        other => other,
    };
    // A file is only read after the fact, so record the steps too
    if config.file.is_some() && !verbose {
        config.level = Level::INFO;
    }

    let file = config.file.clone();
    vio_util::log::init(config);
    file
}
