use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default per-step timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default root for staged scan output
pub const DEFAULT_OUTPUT_DIR: &str = "./data/security/scans";

/// Open bag of tool-specific flags; each scanner reads only its own keys
pub type ExtraArgs = BTreeMap<String, serde_json::Value>;

/// Kind of thing a scan step looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// File or directory
    #[default]
    Path,
    /// Running process, value is a PID
    Process,
    /// Whole host
    System,
    /// Event logs, value is `live` or an `.evtx` directory
    #[serde(alias = "event_log")]
    EventLog,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Process => write!(f, "process"),
            Self::System => write!(f, "system"),
            Self::EventLog => write!(f, "eventlog"),
        }
    }
}

/// What to scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    /// Target discriminator
    #[serde(default)]
    pub kind: TargetKind,

    /// Path, PID, or event-log source depending on `kind`
    #[serde(default)]
    pub value: String,

    /// Descend into directories (path targets)
    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for ScanTarget {
    fn default() -> Self {
        Self {
            kind: TargetKind::Path,
            value: String::new(),
            recursive: true,
        }
    }
}

impl ScanTarget {
    /// Recursive file-system target
    #[must_use]
    pub fn path(value: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Path,
            value: value.into(),
            recursive: true,
        }
    }

    /// Single process by PID
    #[must_use]
    pub fn process(pid: impl ToString) -> Self {
        Self {
            kind: TargetKind::Process,
            value: pid.to_string(),
            recursive: false,
        }
    }

    /// Whole-host target
    #[must_use]
    pub fn system() -> Self {
        Self {
            kind: TargetKind::System,
            value: String::new(),
            recursive: false,
        }
    }

    /// Event-log target (`live` or a directory of `.evtx` files)
    #[must_use]
    pub fn event_log(value: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::EventLog,
            value: value.into(),
            recursive: false,
        }
    }

    /// Set the recursive flag
    #[must_use]
    pub const fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// One scan step request. Built once, consumed read-only by a scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Registry name of the tool / scanner
    pub tool_name: String,

    /// What to scan
    #[serde(default)]
    pub target: ScanTarget,

    /// Time budget for the external process
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,

    /// Root directory for staged output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Tool-specific flags
    #[serde(default)]
    pub extra_args: ExtraArgs,

    /// Report the command instead of running it
    #[serde(default)]
    pub dry_run: bool,

    /// Environment variables passed to the child process only
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ScanConfig {
    /// Create a step for `tool_name` with default settings
    #[must_use]
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            target: ScanTarget::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            extra_args: ExtraArgs::new(),
            dry_run: false,
            env: BTreeMap::new(),
        }
    }

    /// Set the target
    #[must_use]
    pub fn target(mut self, target: ScanTarget) -> Self {
        self.target = target;
        self
    }

    /// Set the timeout in seconds
    #[must_use]
    pub const fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the output root
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Add a tool-specific flag
    #[must_use]
    pub fn extra_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra_args.insert(key.into(), value.into());
        self
    }

    /// Enable or disable dry-run mode
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Add an environment variable for the child process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// String value of an extra arg. Numbers and booleans are rendered as text.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<String> {
        match self.extra_args.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Boolean value of an extra arg; missing or non-boolean means `false`
    #[must_use]
    pub fn extra_flag(&self, key: &str) -> bool {
        match self.extra_args.get(key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }
}

fn default_true() -> bool {
    true
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}
