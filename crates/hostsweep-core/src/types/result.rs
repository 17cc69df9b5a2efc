use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{Finding, ScanConfig, Severity};

/// Lifecycle state of a scan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    Skipped,
}

impl ScanStatus {
    /// Returns true once the step can no longer change state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Skipped
        )
    }

    /// Returns true for statuses that should stop a `stop_on_failure` pipeline
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one scan step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    pub tool_name: String,
    pub status: ScanStatus,
    pub config: ScanConfig,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub return_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// Files left in the step's output directory, sorted
    #[serde(default)]
    pub output_files: Vec<PathBuf>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Set when the tool ran but its output could not be fully interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl ScanResult {
    /// Create a result in the `Running` state for `config`
    #[must_use]
    pub fn start(config: &ScanConfig) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            tool_name: config.tool_name.clone(),
            status: ScanStatus::Running,
            config: config.clone(),
            started_at: Utc::now(),
            completed_at: None,
            duration_secs: None,
            return_code: None,
            stdout: String::new(),
            stderr: String::new(),
            output_files: Vec::new(),
            findings: Vec::new(),
            error_message: None,
            parse_error: None,
        }
    }

    /// Move to a terminal status, stamping completion time and duration
    pub fn finish(&mut self, status: ScanStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        #[allow(clippy::cast_precision_loss)]
        let secs = (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        self.duration_secs = Some(secs);
    }

    /// Finish with an error message
    pub fn fail(&mut self, status: ScanStatus, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.finish(status);
    }

    /// Number of findings
    #[must_use]
    pub fn findings_count(&self) -> usize {
        self.findings.len()
    }

    /// Returns true if any finding is critical
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.count_at(Severity::Critical) > 0
    }

    /// Returns true if any finding is high
    #[must_use]
    pub fn has_high(&self) -> bool {
        self.count_at(Severity::High) > 0
    }

    /// Number of findings with exactly `severity`
    #[must_use]
    pub fn count_at(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Returns true if the tool ran but parsing failed or was partial
    #[must_use]
    pub const fn parse_degraded(&self) -> bool {
        self.parse_error.is_some()
    }
}
