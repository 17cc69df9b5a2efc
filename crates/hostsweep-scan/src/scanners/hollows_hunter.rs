use async_trait::async_trait;
use std::path::{Path, PathBuf};

use hostsweep_core::{Finding, Result, ScanConfig, ScanResult, Severity};

use super::target_pid;
use crate::parser::{parse_hollows_hunter_report, ProcessReport};
use crate::{CommandLine, Scanner};

/// Anomaly counter -> (severity, MITRE technique, description)
const ANOMALIES: [(&str, Severity, Option<&str>, &str); 7] = [
    ("replaced", Severity::Critical, Some("T1055.012"), "Process hollowing: module replaced in memory"),
    ("implanted", Severity::Critical, Some("T1055"), "Code injection: foreign code implanted into process"),
    ("hdr_modified", Severity::High, Some("T1055"), "PE header modification in memory"),
    ("patched", Severity::Medium, Some("T1574"), "Inline patching: code bytes modified"),
    ("iat_hooked", Severity::High, Some("T1574"), "IAT hooking: import table entries redirected"),
    ("unreachable_file", Severity::Medium, None, "Module file on disk cannot be accessed"),
    ("other", Severity::Low, None, "Other memory anomaly"),
];

/// In-memory implant detection across running processes
#[derive(Debug, Clone, Copy, Default)]
pub struct HollowsHunterScanner;

impl HollowsHunterScanner {
    fn report_dir(result: &ScanResult) -> Option<PathBuf> {
        let report = result
            .output_files
            .iter()
            .find(|p| p.file_name().is_some_and(|n| n == "scan_report.json"))?;
        let parent = report.parent()?;
        let is_pid_dir = parent
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));

        if is_pid_dir {
            parent.parent().map(Path::to_path_buf)
        } else {
            Some(parent.to_path_buf())
        }
    }

    fn report_findings(report: &ProcessReport) -> Vec<Finding> {
        let raw = serde_json::to_value(report).unwrap_or_default();

        ANOMALIES
            .iter()
            .filter_map(|(counter, severity, mitre, desc)| {
                let count = report.count(counter);
                if count == 0 {
                    return None;
                }
                let plural = if count == 1 { "anomaly" } else { "anomalies" };
                let finding = Finding::new(
                    "hollows_hunter",
                    *severity,
                    "memory_anomaly",
                    format!("HollowsHunter: {counter} in {} (PID {})", report.name, report.pid),
                    format!(
                        "{desc}. Found {count} {counter} {plural} in process {} (PID {}).",
                        report.name, report.pid
                    ),
                    format!("PID:{}", report.pid),
                )
                .with_raw_data(raw.clone());
                Some(match mitre {
                    Some(technique) => finding.with_mitre_attack(*technique),
                    None => finding,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Scanner for HollowsHunterScanner {
    fn tool_name(&self) -> &str {
        "hollows_hunter"
    }

    fn build_command(&self, exe: &Path, config: &ScanConfig, output_dir: &Path) -> Result<CommandLine> {
        let mut cmd = CommandLine::new(exe)
            .arg("/json")
            .arg("/dir")
            .path_arg(output_dir);

        if let Some(pid) = target_pid(config)? {
            cmd = cmd.arg("/pid").arg(pid.to_string());
        }
        if config.extra_flag("loop") {
            cmd = cmd.arg("/loop");
        }
        if let Some(shellc) = config.extra_str("shellc") {
            cmd = cmd.arg("/shellc").arg(shellc);
        }

        Ok(cmd)
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        let Some(dir) = Self::report_dir(result) else {
            return Ok(Vec::new());
        };

        Ok(parse_hollows_hunter_report(&dir)?
            .iter()
            .flat_map(Self::report_findings)
            .collect())
    }
}
