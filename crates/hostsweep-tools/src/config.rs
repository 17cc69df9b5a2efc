//! Operator configuration for tools and scan output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use hostsweep_core::{ToolInfo, DEFAULT_OUTPUT_DIR};

/// Per-tool settings merged over the built-in catalog entry.
///
/// Fields left unset keep the catalog value. Scanner settings are read by the
/// matching scanner only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOverride {
    /// Explicit executable path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_elevated_privileges: Option<bool>,

    /// Pinned SHA-256 (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_pattern: Option<String>,

    /// YARA rules directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_dir: Option<PathBuf>,

    /// Sigma rules directory (chainsaw)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_dir: Option<PathBuf>,

    /// Sigma field mapping file (chainsaw)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_file: Option<PathBuf>,

    /// Minimum alert level (hayabusa)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<String>,

    /// Default target when a step names none (sigcheck)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,

    /// Refresh signatures before scanning (clamav)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_before_scan: Option<bool>,

    /// Configuration file (sysmon)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl ToolOverride {
    /// Apply the tool-level fields of this override to a catalog entry
    pub fn apply(&self, tool: &mut ToolInfo) {
        if let Some(path) = &self.path {
            tool.path = Some(path.clone());
        }
        if let Some(elevated) = self.requires_elevated_privileges {
            tool.requires_elevated_privileges = elevated;
        }
        if let Some(hash) = &self.expected_hash {
            tool.expected_hash = Some(hash.clone());
        }
        if let Some(repo) = &self.source_repo {
            tool.source_repo = Some(repo.clone());
        }
        if let Some(pattern) = &self.asset_pattern {
            tool.asset_pattern = Some(pattern.clone());
        }
    }
}

/// Top-level tool and output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Root directory holding downloaded tools
    #[serde(default = "default_tools_dir")]
    pub tools_dir: PathBuf,

    /// Root directory for staged scan output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Per-tool overrides keyed by tool name
    #[serde(default)]
    pub tools: BTreeMap<String, ToolOverride>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            tools_dir: default_tools_dir(),
            output_dir: default_output_dir(),
            tools: BTreeMap::new(),
        }
    }
}

impl SweepConfig {
    /// Override for `name`, or an empty one
    #[must_use]
    pub fn tool(&self, name: &str) -> ToolOverride {
        self.tools.get(name).cloned().unwrap_or_default()
    }
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("./tools")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.tools_dir, PathBuf::from("./tools"));
        assert_eq!(config.output_dir, PathBuf::from("./data/security/scans"));
        assert!(config.tools.is_empty());
        assert_eq!(config.tool("clamav"), ToolOverride::default());
    }

    #[test]
    fn test_overrides_from_toml() {
        let src = r#"
            tools_dir = "C:/sec/tools"

            [tools.yara_x]
            rules_dir = "./rules/yara"
            expected_hash = "ABCDEF"

            [tools.clamav]
            path = "C:/Program Files/ClamAV/clamscan.exe"
            update_before_scan = false
        "#;
        let config: SweepConfig = toml::from_str(src).unwrap();
        assert_eq!(config.tools_dir, PathBuf::from("C:/sec/tools"));
        assert_eq!(config.output_dir, PathBuf::from("./data/security/scans"));
        assert_eq!(config.tool("clamav").update_before_scan, Some(false));
        assert_eq!(
            config.tool("yara_x").rules_dir,
            Some(PathBuf::from("./rules/yara"))
        );
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let mut tool = ToolInfo::new("chainsaw", "Chainsaw", "chainsaw.exe")
            .release("WithSecureLabs/chainsaw", "chainsaw_*.zip")
            .license("GPL-3.0");
        let over = ToolOverride {
            expected_hash: Some("aa".into()),
            requires_elevated_privileges: Some(true),
            ..ToolOverride::default()
        };
        over.apply(&mut tool);
        assert_eq!(tool.expected_hash.as_deref(), Some("aa"));
        assert!(tool.requires_elevated_privileges);
        assert_eq!(tool.source_repo.as_deref(), Some("WithSecureLabs/chainsaw"));
        assert!(tool.path.is_none());
    }
}
