//! Sysmon service lifecycle.
//!
//! Sysmon is a telemetry source rather than a scanner: it feeds the event
//! logs Hayabusa and Chainsaw consume. Installing or changing it needs
//! administrator rights.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use hostsweep_core::{Result, SweepError};
use hostsweep_tools::{SweepConfig, ToolManager};

use crate::CommandLine;

const SERVICE_NAME: &str = "Sysmon64";
const DEFAULT_CONFIG_FILE: &str = "./rules/sysmon/sysmonconfig.xml";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Service state reported by [`SysmonManager::status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysmonStatus {
    /// Service is present and running
    pub installed: bool,
    pub service_name: String,
    pub config_file: PathBuf,
    pub config_exists: bool,
}

/// Installs, reconfigures and removes the Sysmon service
#[derive(Debug, Clone)]
pub struct SysmonManager {
    tools: Arc<ToolManager>,
    config_file: PathBuf,
    service_query: CommandLine,
}

impl SysmonManager {
    /// Manager using the `sysmon` override's `config_file`, if any
    #[must_use]
    pub fn new(tools: Arc<ToolManager>, config: &SweepConfig) -> Self {
        let config_file = config
            .tool("sysmon")
            .config_file
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self {
            tools,
            config_file,
            service_query: CommandLine::new("sc").args(["query", SERVICE_NAME]),
        }
    }

    /// Use a different command to query the service state. Its stdout must
    /// contain `RUNNING` when the service is up.
    #[must_use]
    pub fn service_query(mut self, command: CommandLine) -> Self {
        self.service_query = command;
        self
    }

    #[must_use]
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Whether the service is running. Query failures count as not running.
    pub async fn is_installed(&self) -> bool {
        match run(&self.service_query).await {
            Ok(output) => String::from_utf8_lossy(&output.stdout).contains("RUNNING"),
            Err(e) => {
                debug!(error = %e, "Service query failed");
                false
            }
        }
    }

    pub async fn status(&self) -> SysmonStatus {
        SysmonStatus {
            installed: self.is_installed().await,
            service_name: SERVICE_NAME.to_string(),
            config_file: self.config_file.clone(),
            config_exists: self.config_file.is_file(),
        }
    }

    /// Install the service with `config` (or the configured file)
    pub async fn install(&self, config: Option<&Path>) -> Result<()> {
        let config = self.existing_config(config)?;
        info!(config = %config.display(), "Installing Sysmon");
        self.sysmon(|cmd| cmd.arg("-accepteula").arg("-i").path_arg(config))
            .await
    }

    /// Replace the running configuration
    pub async fn update_config(&self, config: Option<&Path>) -> Result<()> {
        let config = self.existing_config(config)?;
        info!(config = %config.display(), "Updating Sysmon configuration");
        self.sysmon(|cmd| cmd.arg("-c").path_arg(config)).await
    }

    pub async fn uninstall(&self) -> Result<()> {
        info!("Uninstalling Sysmon");
        self.sysmon(|cmd| cmd.arg("-u")).await
    }

    fn existing_config<'a>(&'a self, config: Option<&'a Path>) -> Result<&'a Path> {
        let config = config.unwrap_or(&self.config_file);
        if config.is_file() {
            Ok(config)
        } else {
            Err(SweepError::Config(format!(
                "Sysmon config not found: {}",
                config.display()
            )))
        }
    }

    async fn sysmon(&self, args: impl FnOnce(CommandLine) -> CommandLine) -> Result<()> {
        let exe = self.tools.get_tool_path("sysmon")?;
        let command = args(CommandLine::new(exe));
        debug!(command = %command, "Running Sysmon");

        let output = run(&command).await?;
        match output.status.code() {
            Some(0) => {
                info!("Sysmon command succeeded");
                Ok(())
            }
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                error!(code = ?code, stderr = %stderr.trim(), "Sysmon command failed");
                Err(SweepError::NonZeroExit {
                    tool: "sysmon".to_string(),
                    code: code.unwrap_or(-1),
                })
            }
        }
    }
}

async fn run(command: &CommandLine) -> Result<std::process::Output> {
    let output = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(COMMAND_TIMEOUT, output).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(SweepError::Process(format!("{}: {e}", command.program.display()))),
        Err(_) => Err(SweepError::Timeout(COMMAND_TIMEOUT.as_secs())),
    }
}
