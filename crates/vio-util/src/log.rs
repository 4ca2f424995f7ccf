//! Tracing subscriber setup shared by the vio binaries.

use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose events the default filter enables.
const VIO_TARGETS: &[&str] = &["vio", "vio_core", "vio_storage", "vio_snapshot", "vio_util"];

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Most verbose level emitted by the vio crates.
    pub level: Level,
    /// Include source file and line in each event.
    pub include_location: bool,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            include_location: false,
            file: None,
        }
    }
}

impl LogConfig {
    /// Debug output from every vio crate.
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
            file: None,
        }
    }
}

/// `EnvFilter` directives enabling `level` for the vio crates only,
/// e.g. `vio=debug,vio_core=debug,...`.
pub fn filter_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    VIO_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Call once, at startup.
///
/// `RUST_LOG`, when set, replaces the directives derived from `config.level`.
/// If the log file cannot be opened the logs go to stderr instead.
pub fn init(config: LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    let file = config.file.as_ref().and_then(|path| {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Warning: cannot open log file {}: {e}", path.display()))
            .ok()
    });

    match file {
        Some(file) => registry
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(file),
            )
            .init(),
        None => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Per-user log file: `<state dir>/vio/logs/vio.log`.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("vio").join("logs").join("vio.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_quiet() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert!(config.file.is_none());

        let verbose = LogConfig::verbose();
        assert_eq!(verbose.level, Level::DEBUG);
        assert!(verbose.include_location);
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives(Level::INFO),
            "vio=info,vio_core=info,vio_storage=info,vio_snapshot=info,vio_util=info"
        );
    }

    #[test]
    fn test_default_log_path() {
        if let Some(path) = default_log_path() {
            assert!(path.ends_with("vio/logs/vio.log"));
        }
    }
}
