use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::SweepError;

/// Finding severity, ordered `Info < Low < Medium < High < Critical`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, most severe first
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Info,
    ];

    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(SweepError::Parse(format!("unknown severity '{other}'"))),
        }
    }
}

/// One normalized observation produced by a scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Unique id (UUID v4)
    pub finding_id: String,

    /// Scanner that produced this finding
    pub tool_name: String,

    /// Normalized severity
    pub severity: Severity,

    /// Short machine-friendly category (e.g. `malware`, `persistence`)
    pub category: String,

    /// One-line summary
    pub title: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// File path, PID, or other locator the finding refers to
    #[serde(default)]
    pub target: String,

    /// Tool-native record the finding was derived from
    #[serde(default)]
    pub raw_data: serde_json::Value,

    /// When the finding was produced
    pub timestamp: DateTime<Utc>,

    /// MITRE ATT&CK technique id(s), when the tool reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitre_attack: Option<String>,
}

impl Finding {
    /// Create a finding stamped with a fresh id and the current time
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            finding_id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            severity,
            category: category.into(),
            title: title.into(),
            description: description.into(),
            target: target.into(),
            raw_data: serde_json::Value::Null,
            timestamp: Utc::now(),
            mitre_attack: None,
        }
    }

    /// Attach the tool-native record
    #[must_use]
    pub fn with_raw_data(mut self, raw: serde_json::Value) -> Self {
        self.raw_data = raw;
        self
    }

    /// Attach a MITRE ATT&CK reference; blank strings are ignored
    #[must_use]
    pub fn with_mitre_attack(mut self, technique: impl Into<String>) -> Self {
        let technique = technique.into();
        if !technique.trim().is_empty() {
            self.mitre_attack = Some(technique);
        }
        self
    }

    /// Returns true if severity is high or critical
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        self.severity >= Severity::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
        assert_eq!(Severity::ALL.iter().max(), Some(&Severity::Critical));
    }

    #[test]
    fn severity_parse_is_case_insensitive_but_strict() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(" info ".parse::<Severity>().unwrap(), Severity::Info);
        assert!("crit".parse::<Severity>().is_err());
        assert!("".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_serde_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let back: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, Severity::Medium);
    }

    #[test]
    fn finding_ids_are_unique() {
        let a = Finding::new("yara", Severity::High, "malware", "t", "d", "/tmp/a");
        let b = Finding::new("yara", Severity::High, "malware", "t", "d", "/tmp/a");
        assert_ne!(a.finding_id, b.finding_id);
        assert!(a.is_actionable());
    }

    #[test]
    fn blank_mitre_is_dropped() {
        let f = Finding::new("chainsaw", Severity::Low, "c", "t", "", "")
            .with_mitre_attack("  ")
            .with_raw_data(serde_json::json!({"k": 1}));
        assert!(f.mitre_attack.is_none());
        assert_eq!(f.raw_data["k"], 1);

        let f = f.with_mitre_attack("T1059.001");
        assert_eq!(f.mitre_attack.as_deref(), Some("T1059.001"));
    }
}
