//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use hostsweep::Severity;
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Host security sweeps with external scanners
///
/// Runs ClamAV, YARA-X, HollowsHunter, Hayabusa, Chainsaw and the
/// Sysinternals tools as pipelines and reports normalized findings.
#[derive(Parser, Debug)]
#[command(name = "hostsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config.toml)
    #[arg(short, long, env = "HOSTSWEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect the tool registry
    Tools(ToolsArgs),

    /// Download tools from their release pages
    Setup(SetupArgs),

    /// Run a scan pipeline
    Run(RunArgs),

    /// Manage the Sysmon service
    Sysmon(SysmonArgs),

    /// Show CLI configuration
    Config(ConfigArgs),
}

// ============================================================================
// Tools command
// ============================================================================

#[derive(Args, Debug)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ToolsCommands {
    /// Show every registered tool and whether it is installed
    List,

    /// Resolve one tool
    Check {
        /// Tool name (e.g. hayabusa)
        name: String,
    },

    /// Compare a tool binary against its pinned SHA-256
    Verify {
        /// Tool name
        name: String,
    },
}

// ============================================================================
// Setup command
// ============================================================================

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Download only this tool
    #[arg(short, long)]
    pub tool: Option<String>,

    /// Download even when the tool is already installed
    #[arg(short, long)]
    pub force: bool,
}

// ============================================================================
// Run command
// ============================================================================

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommands,

    #[command(flatten)]
    pub options: RunOptions,
}

#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Daily sweep: signatures, patterns, memory, event logs, persistence
    Daily {
        /// Directory to scan with ClamAV and YARA-X
        #[arg(short, long, default_value = "C:\\Users")]
        target: String,
    },

    /// Forensic triage of event logs with Chainsaw and Hayabusa
    Forensic {
        /// Directory holding .evtx files
        #[arg(short, long, default_value = "C:\\Windows\\System32\\winevt\\Logs")]
        evtx: String,
    },

    /// Run a pipeline described in a TOML file
    File {
        /// Pipeline file
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunOptions {
    /// Root directory for scan output (overrides the config file)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Print the commands without running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Stop at the first failed step
    #[arg(long, global = true)]
    pub stop_on_failure: bool,

    /// Only list findings of this severity
    #[arg(long, global = true)]
    pub severity: Option<Severity>,

    /// Maximum number of findings to list
    #[arg(long, global = true, default_value = "50")]
    pub limit: usize,
}

// ============================================================================
// Sysmon command
// ============================================================================

#[derive(Args, Debug)]
pub struct SysmonArgs {
    #[command(subcommand)]
    pub command: SysmonCommands,
}

#[derive(Subcommand, Debug)]
pub enum SysmonCommands {
    /// Show whether the service is running
    Status,

    /// Install the service (administrator rights required)
    Install {
        /// Sysmon XML configuration
        #[arg(long)]
        config_file: Option<PathBuf>,
    },

    /// Replace the running configuration
    Update {
        /// Sysmon XML configuration
        #[arg(long)]
        config_file: Option<PathBuf>,
    },

    /// Remove the service
    Uninstall,
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}
