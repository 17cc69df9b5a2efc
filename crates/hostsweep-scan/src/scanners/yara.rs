use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use hostsweep_core::{Finding, Result, ScanConfig, ScanResult, Severity, TargetKind};
use hostsweep_tools::ToolOverride;

use super::{required_target, target_pid};
use crate::parser::{parse_json_lines, parse_json_str};
use crate::{CommandLine, Scanner};

const DEFAULT_RULES_DIR: &str = "./rules/yara";

/// Pattern matching with YARA-X (`yr scan`)
#[derive(Debug, Clone)]
pub struct YaraScanner {
    rules_dir: PathBuf,
}

impl Default for YaraScanner {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from(DEFAULT_RULES_DIR),
        }
    }
}

impl YaraScanner {
    #[must_use]
    pub fn from_override(over: &ToolOverride) -> Self {
        Self {
            rules_dir: over
                .rules_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_DIR)),
        }
    }

    /// Findings for one match record. Accepts the `{"rule", "file"}` form and
    /// the older `{"path", "rules": [...]}` form.
    fn match_findings(record: &Value) -> Vec<Finding> {
        if let Some(rule) = record.get("rule").and_then(Value::as_str) {
            let file = record.get("file").and_then(Value::as_str).unwrap_or("unknown");
            return vec![Self::finding(rule, file, record.get("metadata"), record)];
        }

        let Some(rules) = record.get("rules").and_then(Value::as_array) else {
            return Vec::new();
        };
        let file = record.get("path").and_then(Value::as_str).unwrap_or("unknown");
        rules
            .iter()
            .map(|rule| {
                let name = rule
                    .get("identifier")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown_rule");
                Self::finding(name, file, rule.get("metadata"), record)
            })
            .collect()
    }

    fn finding(rule: &str, file: &str, metadata: Option<&Value>, raw: &Value) -> Finding {
        let meta = |key: &str| metadata.and_then(|m| m.get(key)).and_then(Value::as_str);

        // Unknown or missing severities stay high: a rule matched.
        let severity = meta("severity")
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or(Severity::High);
        let description = meta("description")
            .map_or_else(|| format!("YARA rule '{rule}' matched"), String::from);

        let finding = Finding::new(
            "yara_x",
            severity,
            "suspicious_pattern",
            format!("YARA: {rule}"),
            format!("{description} (matched in {file})"),
            file,
        )
        .with_raw_data(raw.clone());

        match meta("mitre_attack") {
            Some(technique) => finding.with_mitre_attack(technique),
            None => finding,
        }
    }
}

#[async_trait]
impl Scanner for YaraScanner {
    fn tool_name(&self) -> &str {
        "yara_x"
    }

    fn build_command(&self, exe: &Path, config: &ScanConfig, _output_dir: &Path) -> Result<CommandLine> {
        let rules_dir = config
            .extra_str("rules_dir")
            .map_or_else(|| self.rules_dir.clone(), PathBuf::from);

        let mut cmd = CommandLine::new(exe).arg("scan").path_arg(&rules_dir);

        cmd = match target_pid(config)? {
            Some(pid) => cmd.arg("--pid").arg(pid.to_string()),
            None => cmd.arg(required_target(config)?),
        };
        cmd = cmd.args(["--output-format", "json"]);

        if config.target.recursive && config.target.kind == TargetKind::Path {
            cmd = cmd.arg("-r");
        }
        Ok(cmd)
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        let text = result.stdout.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let records = match parse_json_str(text) {
            Ok(Value::Object(obj)) => match obj.get("matches") {
                Some(Value::Array(matches)) => matches.clone(),
                Some(_) => Vec::new(),
                None => vec![Value::Object(obj)],
            },
            Ok(Value::Array(items)) => items,
            Ok(_) => Vec::new(),
            Err(_) => parse_json_lines(text),
        };

        Ok(records.iter().flat_map(Self::match_findings).collect())
    }
}
