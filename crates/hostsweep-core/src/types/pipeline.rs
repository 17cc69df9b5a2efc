use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Finding, ScanConfig, ScanResult, ScanStatus, Severity};

/// Ordered list of scan steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub steps: Vec<ScanConfig>,

    /// Halt after the first `Failed` step. Timed-out steps do not stop the run.
    #[serde(default)]
    pub stop_on_failure: bool,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            stop_on_failure: false,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn step(mut self, step: ScanConfig) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub const fn stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }
}

/// Outcome of a pipeline run. `scan_results` is in step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub pipeline_id: String,
    pub name: String,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scan_results: Vec<ScanResult>,
}

impl PipelineResult {
    /// Create a running pipeline result
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            pipeline_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            status: ScanStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            scan_results: Vec::new(),
        }
    }

    /// Mark the pipeline completed
    pub fn finish(&mut self) {
        self.status = ScanStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Sum of findings over all steps
    #[must_use]
    pub fn total_findings(&self) -> usize {
        self.scan_results.iter().map(ScanResult::findings_count).sum()
    }

    /// Number of critical findings over all steps
    #[must_use]
    pub fn critical_findings(&self) -> usize {
        self.count_at(Severity::Critical)
    }

    /// Number of high findings over all steps
    #[must_use]
    pub fn high_findings(&self) -> usize {
        self.count_at(Severity::High)
    }

    fn count_at(&self, severity: Severity) -> usize {
        self.scan_results.iter().map(|r| r.count_at(severity)).sum()
    }

    /// Wall-clock duration, if completed
    #[must_use]
    pub fn duration_secs(&self) -> Option<f64> {
        let end = self.completed_at?;
        #[allow(clippy::cast_precision_loss)]
        let secs = (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        Some(secs)
    }

    /// All findings in step order
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.scan_results.iter().flat_map(|r| r.findings.iter())
    }
}
