use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

use hostsweep_core::{Finding, Result, ScanConfig, ScanResult, Severity};
use hostsweep_tools::ToolOverride;

use crate::parser::{first_json_document, parse_json_file, severity_from_sigma_level};
use crate::{CommandLine, Scanner};

const DEFAULT_SIGMA_DIR: &str = "./rules/sigma";
const DEFAULT_EVTX_DIR: &str = "C:\\Windows\\System32\\winevt\\Logs";

/// Sigma-based event-log hunting with Chainsaw. Exit code 1 means
/// detections were found.
#[derive(Debug, Clone)]
pub struct ChainsawScanner {
    sigma_dir: PathBuf,
    mapping_file: Option<PathBuf>,
}

impl Default for ChainsawScanner {
    fn default() -> Self {
        Self {
            sigma_dir: PathBuf::from(DEFAULT_SIGMA_DIR),
            mapping_file: None,
        }
    }
}

impl ChainsawScanner {
    #[must_use]
    pub fn from_override(over: &ToolOverride) -> Self {
        Self {
            sigma_dir: over
                .sigma_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SIGMA_DIR)),
            mapping_file: over.mapping_file.clone(),
        }
    }

    fn detections(data: &Value) -> Vec<&Value> {
        match data {
            Value::Array(items) => items.iter().collect(),
            Value::Object(obj) => match obj.get("detections").or_else(|| obj.get("hits")) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(_) => Vec::new(),
                None => vec![data],
            },
            _ => Vec::new(),
        }
    }

    fn detection_finding(detection: &Value) -> Option<Finding> {
        let text = |key: &str| detection.get(key).and_then(Value::as_str);

        let name = text("name").or_else(|| text("title")).unwrap_or("Unknown detection");
        let level = text("level").or_else(|| text("severity")).unwrap_or("medium");
        let severity = severity_from_sigma_level(level);
        if severity == Severity::Info {
            return None;
        }

        let source = text("source")
            .or_else(|| detection.pointer("/document/path").and_then(Value::as_str))
            .unwrap_or("");

        let mut description = name.to_string();
        if let Some(ts) = text("timestamp").filter(|t| !t.is_empty()) {
            description.push_str(&format!(" at {ts}"));
        }
        if !source.is_empty() {
            description.push_str(&format!(" in {source}"));
        }

        let finding = Finding::new(
            "chainsaw",
            severity,
            "event_log_alert",
            format!("Chainsaw: {name}"),
            description,
            source,
        )
        .with_raw_data(detection.clone());

        let technique = detection
            .get("tags")
            .and_then(Value::as_array)
            .and_then(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|t| t.strip_prefix("attack.t"))
                    .find(|id| id.starts_with(|c: char| c.is_ascii_digit()))
            })
            .map(|id| format!("T{}", id.to_ascii_uppercase()));

        Some(match technique {
            Some(t) => finding.with_mitre_attack(t),
            None => finding,
        })
    }

    fn findings_from(data: &Value) -> Vec<Finding> {
        Self::detections(data)
            .into_iter()
            .filter_map(Self::detection_finding)
            .collect()
    }
}

#[async_trait]
impl Scanner for ChainsawScanner {
    fn tool_name(&self) -> &str {
        "chainsaw"
    }

    fn build_command(&self, exe: &Path, config: &ScanConfig, _output_dir: &Path) -> Result<CommandLine> {
        let mut cmd = CommandLine::new(exe).arg("hunt");

        let sigma_dir = config
            .extra_str("sigma_dir")
            .map_or_else(|| self.sigma_dir.clone(), PathBuf::from);
        if sigma_dir.exists() {
            cmd = cmd.arg("-s").path_arg(&absolute(&sigma_dir));
        }

        cmd = match config.target.value.trim() {
            "" => cmd.arg(DEFAULT_EVTX_DIR),
            target => cmd.arg(target),
        };

        let mapping = config
            .extra_str("mapping_file")
            .map(PathBuf::from)
            .or_else(|| self.mapping_file.clone());
        if let Some(mapping) = mapping.filter(|m| m.exists()) {
            cmd = cmd.arg("--mapping").path_arg(&absolute(&mapping));
        }

        Ok(cmd.args(["--json", "-q"]))
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for path in result
            .output_files
            .iter()
            .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")))
        {
            match parse_json_file(path) {
                Ok(data) => findings.extend(Self::findings_from(&data)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable output"),
            }
        }

        if findings.is_empty() {
            if let Some(data) = first_json_document(&result.stdout) {
                findings = Self::findings_from(&data);
            }
        }

        Ok(findings)
    }

    fn is_success_return_code(&self, code: i32) -> bool {
        code == 1
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostsweep_core::ScanTarget;
    use std::fs;

    fn stdout_findings(stdout: &str) -> Vec<Finding> {
        let mut result = ScanResult::start(&ScanConfig::new("chainsaw"));
        result.stdout = stdout.to_string();
        ChainsawScanner::default().parse_output(&result).unwrap()
    }

    #[test]
    fn command_defaults_to_windows_logs() {
        let dir = tempfile::tempdir().unwrap();
        let sigma = dir.path().join("sigma");
        fs::create_dir(&sigma).unwrap();

        let scanner = ChainsawScanner::from_override(&ToolOverride {
            sigma_dir: Some(sigma.clone()),
            mapping_file: Some(dir.path().join("missing.yml")),
            ..ToolOverride::default()
        });
        let cmd = scanner
            .build_command(Path::new("chainsaw"), &ScanConfig::new("chainsaw"), Path::new("out"))
            .unwrap();
        assert_eq!(
            cmd.args,
            [
                "hunt",
                "-s",
                sigma.display().to_string().as_str(),
                DEFAULT_EVTX_DIR,
                "--json",
                "-q"
            ]
        );
    }

    #[test]
    fn command_with_target_and_no_rules() {
        let scanner = ChainsawScanner::from_override(&ToolOverride {
            sigma_dir: Some(PathBuf::from("/definitely/not/here")),
            ..ToolOverride::default()
        });
        let config = ScanConfig::new("chainsaw").target(ScanTarget::event_log("/cases/evtx"));
        let cmd = scanner
            .build_command(Path::new("chainsaw"), &config, Path::new("out"))
            .unwrap();
        assert_eq!(cmd.args, ["hunt", "/cases/evtx", "--json", "-q"]);
    }

    #[test]
    fn stdout_with_banner() {
        let findings = stdout_findings(
            r#"
 ██████╗██╗  ██╗ chainsaw
[+] Hunting...
[
  {"name": "Mimikatz Use", "level": "high", "timestamp": "2026-01-01T00:00:00Z",
   "document": {"path": "C:\\evtx\\Security.evtx"}, "tags": ["attack.credential_access", "attack.t1003.001"]},
  {"name": "Noise", "level": "informational"},
  {"name": "Odd Level", "level": "crit"}
]
"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].target, "C:\\evtx\\Security.evtx");
        assert_eq!(findings[0].mitre_attack.as_deref(), Some("T1003.001"));
        assert!(findings[0].description.contains("at 2026-01-01T00:00:00Z"));
    }

    #[test]
    fn object_with_detections_key() {
        let findings = stdout_findings(r#"{"detections": [{"title": "T", "severity": "critical"}]}"#);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Chainsaw: T");
        assert_eq!(findings[0].severity, Severity::Critical);

        let findings = stdout_findings(r#"{"name": "Single", "level": "low"}"#);
        assert_eq!(findings.len(), 1);
        assert!(stdout_findings("nothing").is_empty());
    }

    #[test]
    fn output_files_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hits.json");
        fs::write(&file, r#"[{"name": "From File", "level": "medium"}]"#).unwrap();

        let mut result = ScanResult::start(&ScanConfig::new("chainsaw"));
        result.output_files = vec![file];
        result.stdout = r#"[{"name": "From Stdout", "level": "high"}]"#.into();

        let findings = ChainsawScanner::default().parse_output(&result).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Chainsaw: From File");
        assert!(ChainsawScanner::default().is_success_return_code(1));
    }
}
