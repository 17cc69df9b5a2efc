//! Adapters for each supported tool.

mod chainsaw;
mod clamav;
mod hayabusa;
mod hollows_hunter;
mod sysinternals;
mod yara;

pub use chainsaw::ChainsawScanner;
pub use clamav::ClamAvScanner;
pub use hayabusa::HayabusaScanner;
pub use hollows_hunter::HollowsHunterScanner;
pub use sysinternals::{AutorunscScanner, ListDllsScanner, SigcheckScanner};
pub use yara::YaraScanner;

use std::sync::Arc;

use hostsweep_core::{Result, ScanConfig, SweepError, TargetKind};
use hostsweep_tools::SweepConfig;

use crate::Scanner;

/// The eight built-in scanners, configured from per-tool overrides
#[must_use]
pub fn default_scanners(config: &SweepConfig) -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(ClamAvScanner::from_override(&config.tool("clamav"))),
        Arc::new(HollowsHunterScanner),
        Arc::new(YaraScanner::from_override(&config.tool("yara_x"))),
        Arc::new(HayabusaScanner::from_override(&config.tool("hayabusa"))),
        Arc::new(ChainsawScanner::from_override(&config.tool("chainsaw"))),
        Arc::new(AutorunscScanner),
        Arc::new(SigcheckScanner::from_override(&config.tool("sigcheck"))),
        Arc::new(ListDllsScanner),
    ]
}

/// Non-empty target value
fn required_target(config: &ScanConfig) -> Result<&str> {
    let value = config.target.value.trim();
    if value.is_empty() {
        return Err(SweepError::CommandBuild(format!(
            "{} requires a target path",
            config.tool_name
        )));
    }
    Ok(value)
}

/// Numeric PID of a process target, `None` for other kinds
fn target_pid(config: &ScanConfig) -> Result<Option<u32>> {
    if config.target.kind != TargetKind::Process {
        return Ok(None);
    }
    config
        .target
        .value
        .trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| {
            SweepError::CommandBuild(format!("invalid PID '{}'", config.target.value))
        })
}
