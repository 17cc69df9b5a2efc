//! Command implementations.

pub mod config;
pub mod run;
pub mod setup;
pub mod sysmon;
pub mod tools;

use hostsweep::ToolManager;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,

    /// Explicit `--config` path, if given
    pub config_path: Option<PathBuf>,

    /// Output format
    pub output_format: OutputFormat,

    /// Verbose output
    pub verbose: bool,
}

impl Context {
    /// Tool manager for the configured tools directory and overrides.
    pub fn tool_manager(&self) -> Arc<ToolManager> {
        Arc::new(ToolManager::new(&self.config.sweep))
    }
}
