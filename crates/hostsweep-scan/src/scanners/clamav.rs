use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use hostsweep_core::{Finding, Result, ScanConfig, ScanResult, Severity};
use hostsweep_tools::{ToolManager, ToolOverride};

use super::required_target;
use crate::parser::parse_clamscan_log;
use crate::{CommandLine, Scanner};

/// Time budget for the signature refresh
const FRESHCLAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Signature scanning with `clamscan`. Exit code 1 means "infected files
/// found" and is a successful scan.
#[derive(Debug, Clone)]
pub struct ClamAvScanner {
    update_before_scan: bool,
}

impl Default for ClamAvScanner {
    fn default() -> Self {
        Self {
            update_before_scan: true,
        }
    }
}

impl ClamAvScanner {
    #[must_use]
    pub fn from_override(over: &ToolOverride) -> Self {
        Self {
            update_before_scan: over.update_before_scan.unwrap_or(true),
        }
    }

    async fn update_signatures(tools: &ToolManager) {
        let freshclam = match tools.get_tool_path("freshclam") {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "freshclam not available, skipping signature update");
                return;
            }
        };

        info!(path = %freshclam.display(), "Updating ClamAV signatures");
        let run = Command::new(&freshclam)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(FRESHCLAM_TIMEOUT, run).await {
            Ok(Ok(output)) if output.status.success() => info!("ClamAV signatures updated"),
            Ok(Ok(output)) => warn!(
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "freshclam failed"
            ),
            Ok(Err(e)) => warn!(error = %e, "Failed to run freshclam"),
            Err(_) => warn!(timeout = FRESHCLAM_TIMEOUT.as_secs(), "freshclam timed out"),
        }
    }
}

#[async_trait]
impl Scanner for ClamAvScanner {
    fn tool_name(&self) -> &str {
        "clamav"
    }

    fn build_command(&self, exe: &Path, config: &ScanConfig, output_dir: &Path) -> Result<CommandLine> {
        let target = required_target(config)?;
        let mut cmd = CommandLine::new(exe);

        if config.target.recursive {
            cmd = cmd.arg("-r");
        }
        cmd = cmd.arg(format!("--log={}", output_dir.join("clamscan.log").display()));
        if let Some(size) = config.extra_str("max_filesize") {
            cmd = cmd.arg(format!("--max-filesize={size}"));
        }
        if let Some(size) = config.extra_str("max_scansize") {
            cmd = cmd.arg(format!("--max-scansize={size}"));
        }
        if config.extra_flag("no_summary") {
            cmd = cmd.arg("--no-summary");
        }

        Ok(cmd.arg(target))
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        let log = parse_clamscan_log(&result.stdout);

        Ok(log
            .detections
            .into_iter()
            .map(|d| {
                let raw = serde_json::to_value(&d).unwrap_or_default();
                Finding::new(
                    "clamav",
                    Severity::High,
                    "malware_signature",
                    format!("ClamAV: {}", d.signature),
                    format!(
                        "ClamAV detected known malware signature '{}' in file: {}",
                        d.signature, d.file
                    ),
                    d.file,
                )
                .with_raw_data(raw)
            })
            .collect())
    }

    fn is_success_return_code(&self, code: i32) -> bool {
        code == 1
    }

    async fn before_run(&self, tools: &ToolManager, config: &ScanConfig) {
        if self.update_before_scan && !config.dry_run {
            Self::update_signatures(tools).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostsweep_core::{ScanTarget, SweepError};
    use std::path::PathBuf;

    #[test]
    fn command_line() {
        let config = ScanConfig::new("clamav")
            .target(ScanTarget::path("C:\\Users"))
            .extra_arg("max_filesize", "100M")
            .extra_arg("no_summary", true);
        let cmd = ClamAvScanner::default()
            .build_command(Path::new("clamscan.exe"), &config, Path::new("out"))
            .unwrap();

        let log = format!("--log={}", PathBuf::from("out").join("clamscan.log").display());
        assert_eq!(
            cmd.args,
            ["-r", log.as_str(), "--max-filesize=100M", "--no-summary", "C:\\Users"]
        );
    }

    #[test]
    fn empty_target_is_rejected() {
        let config = ScanConfig::new("clamav").target(ScanTarget::path(""));
        let err = ClamAvScanner::default()
            .build_command(Path::new("clamscan.exe"), &config, Path::new("out"))
            .unwrap_err();
        assert!(matches!(err, SweepError::CommandBuild(_)));
    }

    #[test]
    fn non_recursive_omits_flag() {
        let config = ScanConfig::new("clamav").target(ScanTarget::path("/srv").recursive(false));
        let cmd = ClamAvScanner::default()
            .build_command(Path::new("clamscan"), &config, Path::new("out"))
            .unwrap();
        assert!(!cmd.args.contains(&"-r".to_string()));
        assert_eq!(cmd.args.last().map(String::as_str), Some("/srv"));
    }

    #[test]
    fn detections_become_findings() {
        let mut result = ScanResult::start(&ScanConfig::new("clamav"));
        result.stdout = "/tmp/eicar.com: Eicar-Signature FOUND\n/tmp/ok: OK\n".into();

        let scanner = ClamAvScanner::default();
        let findings = scanner.parse_output(&result).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].category, "malware_signature");
        assert_eq!(findings[0].target, "/tmp/eicar.com");
        assert_eq!(findings[0].raw_data["signature"], "Eicar-Signature");
        assert!(scanner.is_success_return_code(1));
        assert!(!scanner.is_success_return_code(2));
    }

    #[test]
    fn update_flag_from_override() {
        let scanner = ClamAvScanner::from_override(&ToolOverride {
            update_before_scan: Some(false),
            ..ToolOverride::default()
        });
        assert!(!scanner.update_before_scan);
        assert!(ClamAvScanner::from_override(&ToolOverride::default()).update_before_scan);
    }
}
