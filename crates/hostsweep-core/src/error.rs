use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hostsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Errors that can occur while resolving, acquiring, or running scan tools
#[derive(Error, Debug)]
pub enum SweepError {
    /// Tool name is not present in the registry
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool is registered but could not be located on disk
    #[error("{display_name} ({exe_name}) not found. {hint}")]
    ToolNotFound {
        /// Registry name of the tool
        tool: String,
        /// Human-readable tool name
        display_name: String,
        /// Executable file name that was searched for
        exe_name: String,
        /// Remediation hint for the operator
        hint: String,
    },

    /// The scanner could not translate its request into a command line
    #[error("invalid scan request: {0}")]
    CommandBuild(String),

    /// External process exceeded its time budget
    #[error("process timed out after {0} seconds")]
    Timeout(u64),

    /// External process could not be spawned or awaited
    #[error("process error: {0}")]
    Process(String),

    /// External process exited with a code the scanner treats as failure
    #[error("{tool} exited with code {code}")]
    NonZeroExit {
        /// Tool that exited
        tool: String,
        /// Process exit code
        code: i32,
    },

    /// Tool output did not match the expected grammar
    #[error("failed to parse output: {0}")]
    Parse(String),

    /// Tool download failed
    #[error("download failed: {0}")]
    Download(String),

    /// No release asset matched the configured pattern
    #[error("no release asset of {repo} matches '{pattern}'")]
    AssetNotFound {
        /// Source repository (`owner/name`)
        repo: String,
        /// Glob pattern used for matching
        pattern: String,
    },

    /// Computed binary hash differs from the pinned hash
    #[error("integrity mismatch for {tool}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// Tool that failed verification
        tool: String,
        /// Pinned SHA-256
        expected: String,
        /// Computed SHA-256
        actual: String,
    },

    /// Remote resource not found
    #[error("resource not found: {resource}")]
    NotFound {
        /// Description of the resource that wasn't found
        resource: String,
    },

    /// Release host refused the request because of rate limiting
    #[error("rate limit exceeded by release host")]
    RateLimited,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error with the offending path
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(String),
}

impl SweepError {
    /// Build an [`SweepError::Io`] for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the condition is expected in normal operation and is
    /// reported rather than treated as a fault
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound { .. }
                | Self::Parse(_)
                | Self::Download(_)
                | Self::AssetNotFound { .. }
                | Self::IntegrityMismatch { .. }
                | Self::RateLimited
        )
    }

    /// Returns true if the error came from tool acquisition
    #[must_use]
    pub const fn is_acquisition_error(&self) -> bool {
        matches!(
            self,
            Self::Download(_)
                | Self::AssetNotFound { .. }
                | Self::NotFound { .. }
                | Self::RateLimited
                | Self::Http(_)
        )
    }
}
