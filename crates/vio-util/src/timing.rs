//! Duration logging for long-running steps.
//!
//! A [`TimingGuard`] is created at the start of a step and logs how long the
//! step took when it goes out of scope, on success and error paths alike:
//!
//! ```rust,ignore
//! let _timing = TimingGuard::operation("commit").with_detail(revision);
//! // snapshot and index append
//! ```

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Steps at least this long are logged at info level.
const INFO_AFTER: Duration = Duration::from_millis(100);

/// Steps at least this long are logged as slow.
const WARN_AFTER: Duration = Duration::from_secs(5);

/// Severity a finished step is logged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Debug,
    Info,
    Warn,
}

/// Logs the elapsed time of a step when dropped.
pub struct TimingGuard {
    /// Category, e.g. `operation` or `sync`
    kind: &'static str,
    /// What is being timed, e.g. `commit 3f2a9c1`
    label: String,
    start: Instant,
    info_after: Duration,
    warn_after: Duration,
}

impl TimingGuard {
    pub fn new(kind: &'static str, label: impl Into<String>) -> Self {
        let label = label.into();
        debug!(kind, %label, "Started");
        Self {
            kind,
            label,
            start: Instant::now(),
            info_after: INFO_AFTER,
            warn_after: WARN_AFTER,
        }
    }

    /// Guard for a backend operation (commit, checkout).
    pub fn operation(name: impl Into<String>) -> Self {
        Self::new("operation", name)
    }

    /// Guard for one synchronizer run; always reported at info level.
    pub fn sync(tool: impl Into<String>) -> Self {
        Self::new("sync", tool).with_info_after(Duration::ZERO)
    }

    /// Append a detail such as a revision or path to the label.
    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.label = format!("{} {}", self.label, detail);
        self
    }

    pub fn with_info_after(mut self, threshold: Duration) -> Self {
        self.info_after = threshold;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn severity(&self, elapsed: Duration) -> Severity {
        if elapsed >= self.warn_after {
            Severity::Warn
        } else if elapsed >= self.info_after {
            Severity::Info
        } else {
            Severity::Debug
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let duration = human_duration(elapsed);
        let duration_ms = elapsed.as_millis() as u64;
        let (kind, label) = (self.kind, &self.label);

        match self.severity(elapsed) {
            Severity::Warn => warn!(kind, %label, duration_ms, %duration, "Slow step finished"),
            Severity::Info => info!(kind, %label, duration_ms, %duration, "Finished"),
            Severity::Debug => debug!(kind, %label, duration_ms, %duration, "Finished"),
        }
    }
}

/// Render a duration as `850ms`, `2.50s` or `3m 12.0s`.
fn human_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    match ms {
        0..=999 => format!("{ms}ms"),
        1_000..=59_999 => format!("{:.2}s", elapsed.as_secs_f64()),
        _ => format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0),
    }
}
