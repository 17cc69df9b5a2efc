//! Output formatting for different formats.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use hostsweep::{Finding, ScanStatus, Severity};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed tables with colors
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// YAML output
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "table" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => anyhow::bail!(
                "Unknown output format: {}\n\
                 Valid formats: pretty, json, csv, yaml",
                s
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Print `value` as JSON or YAML. Returns `false` for the other formats so
/// the caller can render them itself.
pub fn print_structured<T: Serialize>(format: OutputFormat, value: &T) -> anyhow::Result<bool> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Pretty | OutputFormat::Csv => return Ok(false),
    }
    Ok(true)
}

/// Write `rows` as CSV with a header line
pub fn write_csv<T: Serialize>(out: impl Write, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Flat finding record for CSV output
#[derive(Debug, Serialize)]
pub struct FindingRow<'a> {
    pub severity: Severity,
    pub tool: &'a str,
    pub category: &'a str,
    pub title: &'a str,
    pub target: &'a str,
    pub mitre_attack: &'a str,
    pub timestamp: String,
}

impl<'a> From<&'a Finding> for FindingRow<'a> {
    fn from(f: &'a Finding) -> Self {
        Self {
            severity: f.severity,
            tool: &f.tool_name,
            category: &f.category,
            title: &f.title,
            target: &f.target,
            mitre_attack: f.mitre_attack.as_deref().unwrap_or(""),
            timestamp: f.timestamp.to_rfc3339(),
        }
    }
}

pub fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.cyan(),
        Severity::Info => label.dimmed(),
    }
}

pub fn status_label(status: ScanStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        ScanStatus::Completed => label.green(),
        ScanStatus::Failed | ScanStatus::TimedOut => label.red().bold(),
        ScanStatus::Skipped => label.yellow(),
        ScanStatus::Pending | ScanStatus::Running => label.normal(),
    }
}

/// Shorten `s` to at most `max` characters
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
