use async_trait::async_trait;
use std::path::Path;

use hostsweep_core::{Finding, Result, ScanConfig, ScanResult};
use hostsweep_tools::ToolManager;

use crate::CommandLine;

/// Adapter for one external tool.
///
/// Implementations only translate: a [`ScanConfig`] into a command line, and
/// the captured output into findings. Spawning, timeouts and status
/// classification live in [`crate::run_scan`].
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Registry name of the tool this adapter drives
    fn tool_name(&self) -> &str;

    /// Build the command for `exe`. `output_dir` is the step's staging
    /// directory; it may not exist yet during a dry run.
    fn build_command(
        &self,
        exe: &Path,
        config: &ScanConfig,
        output_dir: &Path,
    ) -> Result<CommandLine>;

    /// Convert captured output into findings
    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>>;

    /// Non-zero exit codes that still mean the scan succeeded
    fn is_success_return_code(&self, _code: i32) -> bool {
        false
    }

    /// Runs after staging and before the tool is spawned, for real runs only.
    ///
    /// Not bounded by the step timeout. The step's `started_at` is taken
    /// after this returns, so the hook does not count toward `duration_secs`.
    async fn before_run(&self, _tools: &ToolManager, _config: &ScanConfig) {}
}
