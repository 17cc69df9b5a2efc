use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

use hostsweep_core::{Finding, Result, ScanConfig, ScanResult, Severity};
use hostsweep_tools::ToolOverride;

use crate::parser::{parse_csv, read_text_file, row_value, severity_from_hayabusa_level};
use crate::{CommandLine, Scanner};

const DEFAULT_MIN_LEVEL: &str = "medium";
const TIMELINE_FILE: &str = "hayabusa_timeline.csv";

/// Event-log threat hunting with Hayabusa (`csv-timeline`)
#[derive(Debug, Clone)]
pub struct HayabusaScanner {
    min_level: String,
}

impl Default for HayabusaScanner {
    fn default() -> Self {
        Self {
            min_level: DEFAULT_MIN_LEVEL.to_string(),
        }
    }
}

impl HayabusaScanner {
    #[must_use]
    pub fn from_override(over: &ToolOverride) -> Self {
        Self {
            min_level: over
                .min_level
                .clone()
                .unwrap_or_else(|| DEFAULT_MIN_LEVEL.to_string()),
        }
    }

    fn timeline_findings(text: &str) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for row in parse_csv(text)? {
            let level = row_value(&row, &["Level", "level"]);
            let severity = severity_from_hayabusa_level(level);
            if severity == Severity::Info {
                continue;
            }

            let title = match row_value(&row, &["RuleTitle", "rule_title"]) {
                "" => "Unknown rule",
                t => t,
            };
            let computer = row_value(&row, &["Computer", "computer"]);
            let channel = row_value(&row, &["Channel", "channel"]);
            let details = row_value(&row, &["Details", "details"]);

            let raw = serde_json::to_value(&row).unwrap_or_default();
            findings.push(
                Finding::new(
                    "hayabusa",
                    severity,
                    "event_log_alert",
                    format!("Hayabusa: {title}"),
                    format!("[{level}] {title} on {computer} (Channel: {channel}): {details}"),
                    format!("{computer}:{channel}"),
                )
                .with_raw_data(raw),
            );
        }

        Ok(findings)
    }
}

#[async_trait]
impl Scanner for HayabusaScanner {
    fn tool_name(&self) -> &str {
        "hayabusa"
    }

    fn build_command(&self, exe: &Path, config: &ScanConfig, output_dir: &Path) -> Result<CommandLine> {
        let mut cmd = CommandLine::new(exe).args(["csv-timeline", "--no-wizard"]);

        cmd = match config.target.value.trim() {
            "" | "live" => cmd.arg("-l"),
            dir => cmd.arg("-d").arg(dir),
        };

        let min_level = config
            .extra_str("min_level")
            .unwrap_or_else(|| self.min_level.clone());

        Ok(cmd
            .arg("-m")
            .arg(min_level)
            .arg("-o")
            .path_arg(&output_dir.join(TIMELINE_FILE))
            .arg("-q"))
    }

    fn parse_output(&self, result: &ScanResult) -> Result<Vec<Finding>> {
        let timeline = result
            .output_files
            .iter()
            .find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")));

        if let Some(path) = timeline {
            match read_text_file(path) {
                Ok(text) => return Self::timeline_findings(&text),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to read timeline"),
            }
        }

        if result.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        Self::timeline_findings(&result.stdout)
    }
}
