//! Ordered multi-step sweeps.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use hostsweep_core::{
    Finding, PipelineConfig, PipelineResult, ScanConfig, ScanResult, ScanStatus, ScanTarget,
};
use hostsweep_tools::{SweepConfig, ToolManager};

use crate::monitor::FindingsQuery;
use crate::scanners::default_scanners;
use crate::{run_scan, Scanner};

const DEFAULT_EVTX_DIR: &str = "C:\\Windows\\System32\\winevt\\Logs";

/// Runs pipelines step by step and keeps every result.
///
/// Safe to share behind an `Arc`: separate pipeline runs may proceed
/// concurrently, and the history is append-only.
pub struct ScanPipeline {
    tools: Arc<ToolManager>,
    scanners: BTreeMap<String, Arc<dyn Scanner>>,
    history: RwLock<Vec<PipelineResult>>,
}

impl ScanPipeline {
    /// Pipeline with the built-in scanners, configured from `config`
    #[must_use]
    pub fn new(tools: Arc<ToolManager>, config: &SweepConfig) -> Self {
        let mut pipeline = Self::empty(tools);
        for scanner in default_scanners(config) {
            pipeline.register(scanner);
        }
        pipeline
    }

    /// Pipeline with no scanners registered
    #[must_use]
    pub fn empty(tools: Arc<ToolManager>) -> Self {
        Self {
            tools,
            scanners: BTreeMap::new(),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Register `scanner` under its tool name, replacing any previous one
    pub fn register(&mut self, scanner: Arc<dyn Scanner>) {
        self.scanners
            .insert(scanner.tool_name().to_string(), scanner);
    }

    #[must_use]
    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    #[must_use]
    pub fn scanner_names(&self) -> Vec<String> {
        self.scanners.keys().cloned().collect()
    }

    /// Run every step of `config` in order.
    ///
    /// Steps naming an unregistered tool are recorded as `Skipped`. With
    /// `stop_on_failure`, the first `Failed` step ends the run and the
    /// pipeline is marked `Failed`. The result is appended to the history
    /// either way.
    pub async fn run_pipeline(&self, config: &PipelineConfig) -> PipelineResult {
        let mut result = PipelineResult::start(&config.name);
        let total = config.steps.len();
        info!(pipeline = %config.name, steps = total, "Starting pipeline");

        for (idx, step) in config.steps.iter().enumerate() {
            let n = idx + 1;
            let Some(scanner) = self.scanners.get(&step.tool_name) else {
                warn!(step = n, tool = %step.tool_name, "No scanner registered, skipping");
                let mut skipped = ScanResult::start(step);
                skipped.fail(
                    ScanStatus::Skipped,
                    format!("No scanner registered for '{}'", step.tool_name),
                );
                result.scan_results.push(skipped);
                continue;
            };

            info!(step = n, of = total, tool = %step.tool_name, "Running step");
            let scan = run_scan(scanner.as_ref(), &self.tools, step).await;
            info!(
                step = n,
                tool = %step.tool_name,
                status = %scan.status,
                findings = scan.findings_count(),
                "Step finished"
            );

            let failed = scan.status == ScanStatus::Failed;
            result.scan_results.push(scan);

            if config.stop_on_failure && failed {
                warn!(pipeline = %config.name, tool = %step.tool_name, "Step failed, stopping pipeline");
                result.status = ScanStatus::Failed;
                result.completed_at = Some(Utc::now());
                self.record(&result);
                return result;
            }
        }

        result.finish();
        info!(
            pipeline = %config.name,
            findings = result.total_findings(),
            critical = result.critical_findings(),
            high = result.high_findings(),
            "Pipeline completed"
        );
        self.record(&result);
        result
    }

    fn record(&self, result: &PipelineResult) {
        self.history
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(result.clone());
    }

    /// The last `limit` pipeline results, oldest first
    #[must_use]
    pub fn recent_results(&self, limit: usize) -> Vec<PipelineResult> {
        let history = self
            .history
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let skip = history.len().saturating_sub(limit);
        history[skip..].to_vec()
    }

    /// Findings across the history, newest pipeline first, capped at `limit`
    #[must_use]
    pub fn all_findings(&self, limit: Option<usize>) -> Vec<Finding> {
        self.collect_findings(|_| true, limit)
    }

    /// Findings matching `query`, newest pipeline first
    #[must_use]
    pub fn findings(&self, query: &FindingsQuery) -> Vec<Finding> {
        self.collect_findings(|f| query.matches(f), Some(query.limit))
    }

    fn collect_findings(&self, keep: impl Fn(&Finding) -> bool, limit: Option<usize>) -> Vec<Finding> {
        let history = self
            .history
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        history
            .iter()
            .rev()
            .flat_map(|p| p.findings())
            .filter(|f| keep(*f))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Scheduled sweep: signatures, patterns, memory, live event logs,
    /// persistence, unsigned binaries and DLLs
    #[must_use]
    pub fn daily_pipeline(target: &str, output_dir: &Path) -> PipelineConfig {
        let step = |tool: &str, target: ScanTarget, timeout: u64| {
            ScanConfig::new(tool)
                .target(target)
                .output_dir(output_dir)
                .timeout_secs(timeout)
        };

        PipelineConfig::new("daily_security_scan")
            .description(
                "Standard daily scan: ClamAV, YARA, HollowsHunter, Hayabusa, Autoruns, Sigcheck, ListDLLs",
            )
            .step(step("clamav", ScanTarget::path(target), 1800))
            .step(step("yara_x", ScanTarget::path(target), 1800))
            .step(step("hollows_hunter", ScanTarget::system(), 600))
            .step(step("hayabusa", ScanTarget::event_log("live"), 600))
            .step(step("autorunsc", ScanTarget::system(), 300))
            .step(step("sigcheck", ScanTarget::path("C:\\Windows\\System32"), 600))
            .step(step("listdlls", ScanTarget::system(), 300))
    }

    /// Event-log triage over `evtx_path`: Chainsaw, then a low-threshold
    /// Hayabusa timeline. An empty path means the Windows log directory.
    #[must_use]
    pub fn forensic_pipeline(evtx_path: &str, output_dir: &Path) -> PipelineConfig {
        let evtx = if evtx_path.trim().is_empty() {
            DEFAULT_EVTX_DIR
        } else {
            evtx_path
        };

        PipelineConfig::new("forensic_triage")
            .description("Forensic triage: Chainsaw + Hayabusa deep analysis")
            .step(
                ScanConfig::new("chainsaw")
                    .target(ScanTarget::path(evtx))
                    .output_dir(output_dir)
                    .timeout_secs(1800),
            )
            .step(
                ScanConfig::new("hayabusa")
                    .target(ScanTarget::event_log(evtx))
                    .output_dir(output_dir)
                    .timeout_secs(1800)
                    .extra_arg("min_level", "low"),
            )
    }
}

impl std::fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("scanners", &self.scanner_names())
            .finish_non_exhaustive()
    }
}
