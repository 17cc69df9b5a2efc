//! Sysinternals command-line tools: persistence, signatures, loaded DLLs.

use async_trait::async_trait;
use std::path::Path;

use hostsweep_core::{Finding, Result, ScanConfig, ScanResult, Severity};
use hostsweep_tools::ToolOverride;

use crate::parser::{parse_csv, row_value, CsvRow};
use crate::{CommandLine, Scanner};

const DEFAULT_SIGCHECK_TARGET: &str = "C:\\Windows\\System32";

/// Autostart enumeration with `autorunsc`
#[derive(Debug, Clone, Copy, Default)]
pub struct AutorunscScanner;

impl AutorunscScanner {
    fn row_findings(row: &CsvRow) -> Vec<Finding> {
        let entry = row_value(row, &["Entry", "Entry Location"]);
        let image = row_value(row, &["Image Path"]);
        let launch = row_value(row, &["Launch String"]);
        let verified = row_value(row, &["Verified"]);
        let target = if image.is_empty() { entry } else { image };
        let raw = serde_json::to_value(row).unwrap_or_default();

        let mut findings = Vec::new();
        if verified.to_ascii_lowercase().contains("not verified") {
            findings.push(
                Finding::new(
                    "autorunsc",
                    Severity::High,
                    "persistence",
                    format!("Autoruns: unsigned entry at {entry}"),
                    format!("Unsigned autostart entry: {entry}. Image: {image}. Launch: {launch}"),
                    target,
                )
                .with_raw_data(raw.clone())
                .with_mitre_attack("T1547"),
            );
        }

        let vt = row_value(row, &["VT detection", "VirusTotal"]);
        if vt_positive(vt) {
            findings.push(
                Finding::new(
                    "autorunsc",
                    Severity::Critical,
                    "persistence",
                    format!("Autoruns: VT hit on {entry}"),
                    format!("VirusTotal detection {vt} for autostart entry: {entry}. Image: {image}"),
                    target,
                )
                .with_raw_data(raw)
                .with_mitre_attack("T1547"),
            );
        }
        findings
    }
}

/// `n|m` with `n > 0`
fn vt_positive(value: &str) -> bool {
    value
        .split_once('|')
        .and_then(|(hits, _)| hits.trim().parse::<u32>().ok())
        .is_some_and(|hits| hits > 0)
}

#[async_trait]
impl Scanner for AutorunscScanner {
    fn tool_name(&self) -> &str {
        "autorunsc"
    }

    fn build_command(&self, exe: &Path, config: &ScanConfig, _output_dir: &Path) -> Result<CommandLine> {
        let cmd = CommandLine::new(exe).args(["-a", "*", "-c", "-h", "-s", "-m", "-accepteula"]);
        Ok(if config.extra_flag("virustotal") {
            cmd.arg("-vt")
        } else {
            cmd
        })
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        if result.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(parse_csv(&result.stdout)?
            .iter()
            .flat_map(Self::row_findings)
            .collect())
    }
}

/// Unsigned executable discovery with `sigcheck`
#[derive(Debug, Clone)]
pub struct SigcheckScanner {
    target_path: String,
}

impl Default for SigcheckScanner {
    fn default() -> Self {
        Self {
            target_path: DEFAULT_SIGCHECK_TARGET.to_string(),
        }
    }
}

impl SigcheckScanner {
    #[must_use]
    pub fn from_override(over: &ToolOverride) -> Self {
        Self {
            target_path: over
                .target_path
                .clone()
                .unwrap_or_else(|| DEFAULT_SIGCHECK_TARGET.to_string()),
        }
    }
}

#[async_trait]
impl Scanner for SigcheckScanner {
    fn tool_name(&self) -> &str {
        "sigcheck"
    }

    fn build_command(&self, exe: &Path, config: &ScanConfig, _output_dir: &Path) -> Result<CommandLine> {
        let target = match config.target.value.trim() {
            "" => self.target_path.as_str(),
            t => t,
        };
        Ok(CommandLine::new(exe)
            .args(["-u", "-e", "-s", "-c", "-accepteula"])
            .arg(target))
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        if result.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(parse_csv(&result.stdout)?
            .into_iter()
            .filter(|row| row_value(row, &["Verified"]).eq_ignore_ascii_case("unsigned"))
            .map(|row| {
                let path = row_value(&row, &["Path"]).to_string();
                let publisher = match row_value(&row, &["Publisher"]) {
                    "" | "n/a" => "unknown",
                    p => p,
                };
                let file_name = path.rsplit(['\\', '/']).next().unwrap_or(path.as_str());
                Finding::new(
                    "sigcheck",
                    Severity::Medium,
                    "unsigned_binary",
                    format!("Sigcheck: unsigned binary {file_name}"),
                    format!("Unsigned executable found: {path}. Publisher: {publisher}"),
                    path.as_str(),
                )
                .with_raw_data(serde_json::to_value(&row).unwrap_or_default())
            })
            .collect())
    }
}

/// Unsigned DLLs loaded into running processes, via `listdlls -u`
#[derive(Debug, Clone, Copy, Default)]
pub struct ListDllsScanner;

#[async_trait]
impl Scanner for ListDllsScanner {
    fn tool_name(&self) -> &str {
        "listdlls"
    }

    fn build_command(&self, exe: &Path, _config: &ScanConfig, _output_dir: &Path) -> Result<CommandLine> {
        Ok(CommandLine::new(exe).args(["-u", "-accepteula"]))
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let mut process = String::new();
        let mut pid = String::new();

        for line in result.stdout.lines().map(str::trim) {
            if let Some((name, rest)) = line.split_once("pid:") {
                process = name.trim().to_string();
                pid = rest.trim().to_string();
                continue;
            }
            if !line.starts_with("0x") {
                continue;
            }

            // base, size, version, then the path (which may contain spaces)
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                continue;
            }
            let dll = parts[3..].join(" ");

            findings.push(
                Finding::new(
                    "listdlls",
                    Severity::Medium,
                    "unsigned_dll",
                    format!("ListDLLs: unsigned DLL in {process}"),
                    format!("Unsigned DLL loaded into {process} (PID {pid}): {dll}"),
                    dll.as_str(),
                )
                .with_raw_data(serde_json::json!({
                    "process": process,
                    "pid": pid,
                    "dll_path": dll,
                }))
                .with_mitre_attack("T1055.001"),
            );
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostsweep_core::ScanTarget;

    fn result_with(stdout: &str) -> ScanResult {
        let mut result = ScanResult::start(&ScanConfig::new("x"));
        result.stdout = stdout.to_string();
        result
    }

    #[test]
    fn autorunsc_command() {
        let config = ScanConfig::new("autorunsc").extra_arg("virustotal", true);
        let cmd = AutorunscScanner
            .build_command(Path::new("autorunsc64.exe"), &config, Path::new("o"))
            .unwrap();
        assert_eq!(
            cmd.args,
            ["-a", "*", "-c", "-h", "-s", "-m", "-accepteula", "-vt"]
        );
    }

    #[test]
    fn autorunsc_unsigned_and_vt() {
        let csv = "\
Time,Entry Location,Entry,Enabled,Category,Profile,Description,Verified,Company,Image Path,Version,Launch String,VT detection
,HKLM\\Run,Updater,enabled,Logon,System-wide,,(Not verified) Evil Corp,Evil,C:\\evil\\upd.exe,1.0,C:\\evil\\upd.exe -q,5|70
,HKLM\\Run,Helper,enabled,Logon,System-wide,,(Verified) Good Corp,Good,C:\\good\\h.exe,1.0,C:\\good\\h.exe,0|70
";
        let findings = AutorunscScanner.parse_output(&result_with(csv)).unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].target, "C:\\evil\\upd.exe");
        assert_eq!(findings[0].mitre_attack.as_deref(), Some("T1547"));
        assert_eq!(findings[1].severity, Severity::Critical);
        assert!(findings[1].description.contains("5|70"));
    }

    #[test]
    fn vt_parsing() {
        assert!(vt_positive("3|71"));
        assert!(!vt_positive("0|71"));
        assert!(!vt_positive("Unknown"));
        assert!(!vt_positive(""));
    }

    #[test]
    fn sigcheck_defaults_target() {
        let cmd = SigcheckScanner::default()
            .build_command(Path::new("sigcheck64.exe"), &ScanConfig::new("sigcheck"), Path::new("o"))
            .unwrap();
        assert_eq!(cmd.args.last().map(String::as_str), Some(DEFAULT_SIGCHECK_TARGET));

        let config = ScanConfig::new("sigcheck").target(ScanTarget::path("D:\\apps"));
        let cmd = SigcheckScanner::default()
            .build_command(Path::new("sigcheck64.exe"), &config, Path::new("o"))
            .unwrap();
        assert_eq!(cmd.args, ["-u", "-e", "-s", "-c", "-accepteula", "D:\\apps"]);
    }

    #[test]
    fn sigcheck_unsigned_rows() {
        let csv = "\
Path,Verified,Date,Publisher,Company,Description,Product,Product Version,File Version,Machine Type
c:\\windows\\system32\\odd.exe,Unsigned,1:00 AM 1/1/2026,n/a,n/a,n/a,n/a,n/a,n/a,64-bit
c:\\windows\\system32\\fine.exe,Signed,1:00 AM 1/1/2026,Microsoft,n/a,n/a,n/a,n/a,n/a,64-bit
";
        let findings = SigcheckScanner::default()
            .parse_output(&result_with(csv))
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Sigcheck: unsigned binary odd.exe");
        assert_eq!(findings[0].severity, Severity::Medium);
        assert!(findings[0].description.ends_with("Publisher: unknown"));
    }

    #[test]
    fn listdlls_text() {
        let text = "\
ListDLLs v3.2 - Listing loaded DLLs

------------------------------------------------------------------------------
svchost.exe pid: 1234
Command line: C:\\Windows\\system32\\svchost.exe -k netsvcs

  Base                Size      Path
  0x0000000071230000  0x24000   1.0.0.0   C:\\Program Files\\Odd Vendor\\hook.dll
------------------------------------------------------------------------------
explorer.exe pid: 4321
  0x0000000072000000  0x1000    C:\\short.dll
";
        let findings = ListDllsScanner.parse_output(&result_with(text)).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].target, "C:\\Program Files\\Odd Vendor\\hook.dll");
        assert_eq!(findings[0].raw_data["pid"], "1234");
        assert_eq!(findings[0].mitre_attack.as_deref(), Some("T1055.001"));
        assert_eq!(findings[0].title, "ListDLLs: unsigned DLL in svchost.exe");
    }
}
