//! Read-only views over tool availability and pipeline history.
//!
//! These are the shapes a status page or a CLI table renders; they carry no
//! behavior beyond conversion and filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use hostsweep_core::{
    Finding, InstallMethod, PipelineResult, ScanResult, ScanStatus, Severity, ToolInfo,
};
use hostsweep_tools::ToolManager;

/// Default cap for [`FindingsQuery`]
pub const DEFAULT_FINDINGS_LIMIT: usize = 50;

/// Availability of one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub display_name: String,
    pub installed: bool,
    pub path: Option<PathBuf>,
    pub requires_elevated_privileges: bool,
    pub license: String,
    pub install_method: InstallMethod,
}

impl From<&ToolInfo> for ToolStatus {
    fn from(info: &ToolInfo) -> Self {
        Self {
            display_name: info.display_name.clone(),
            installed: info.installed,
            path: info.path.clone(),
            requires_elevated_privileges: info.requires_elevated_privileges,
            license: info.license.clone(),
            install_method: info.install_method,
        }
    }
}

/// Availability of every registered tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAvailability {
    pub tools: BTreeMap<String, ToolStatus>,
    pub installed_count: usize,
    pub total_count: usize,
}

impl ToolAvailability {
    /// Resolve every tool known to `manager`
    #[must_use]
    pub fn collect(manager: &ToolManager) -> Self {
        Self::from_infos(&manager.check_all_tools())
    }

    #[must_use]
    pub fn from_infos(infos: &BTreeMap<String, ToolInfo>) -> Self {
        let tools: BTreeMap<String, ToolStatus> = infos
            .iter()
            .map(|(name, info)| (name.clone(), ToolStatus::from(info)))
            .collect();
        Self {
            installed_count: tools.values().filter(|t| t.installed).count(),
            total_count: tools.len(),
            tools,
        }
    }
}

/// One step of a [`PipelineSummary`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub tool_name: String,
    pub status: ScanStatus,
    pub findings_count: usize,
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&ScanResult> for StepSummary {
    fn from(result: &ScanResult) -> Self {
        Self {
            tool_name: result.tool_name.clone(),
            status: result.status,
            findings_count: result.findings_count(),
            duration_secs: result.duration_secs,
            error_message: result.error_message.clone(),
        }
    }
}

/// Pipeline run without the findings themselves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub pipeline_id: String,
    pub name: String,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub total_findings: usize,
    pub critical_findings: usize,
    pub high_findings: usize,
    pub steps: Vec<StepSummary>,
}

impl From<&PipelineResult> for PipelineSummary {
    fn from(result: &PipelineResult) -> Self {
        Self {
            pipeline_id: result.pipeline_id.clone(),
            name: result.name.clone(),
            status: result.status,
            started_at: result.started_at,
            completed_at: result.completed_at,
            duration_secs: result.duration_secs(),
            total_findings: result.total_findings(),
            critical_findings: result.critical_findings(),
            high_findings: result.high_findings(),
            steps: result.scan_results.iter().map(StepSummary::from).collect(),
        }
    }
}

/// Filter for [`crate::ScanPipeline::findings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsQuery {
    /// Only findings of exactly this severity
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

const fn default_limit() -> usize {
    DEFAULT_FINDINGS_LIMIT
}

impl Default for FindingsQuery {
    fn default() -> Self {
        Self {
            severity: None,
            limit: DEFAULT_FINDINGS_LIMIT,
        }
    }
}

impl FindingsQuery {
    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn matches(&self, finding: &Finding) -> bool {
        self.severity.map_or(true, |s| finding.severity == s)
    }
}
