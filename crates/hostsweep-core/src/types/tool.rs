use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a tool binary is acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMethod {
    /// Latest release asset fetched from the source repository
    #[default]
    ReleaseDownload,
    /// Vendor installer package (MSI or similar), installed by the operator
    PackagedInstaller,
    /// Operator places the binary by hand
    Manual,
}

impl InstallMethod {
    /// Returns true if the tool can be fetched automatically
    #[must_use]
    pub const fn is_downloadable(&self) -> bool {
        matches!(self, Self::ReleaseDownload)
    }
}

impl std::fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReleaseDownload => write!(f, "release_download"),
            Self::PackagedInstaller => write!(f, "packaged_installer"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Metadata and resolved location for an external security tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Registry key (e.g. `hollows_hunter`)
    pub name: String,

    /// Human-readable name
    pub display_name: String,

    /// Executable file name searched for on disk
    pub exe_name: String,

    /// Version string, when known
    #[serde(default)]
    pub version: Option<String>,

    /// Resolved executable path; `None` unless resolution succeeded or a
    /// path was configured explicitly
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Pinned SHA-256 of the executable (hex)
    #[serde(default)]
    pub expected_hash: Option<String>,

    /// Acquisition method
    #[serde(default)]
    pub install_method: InstallMethod,

    /// Release repository (`owner/name`)
    #[serde(default)]
    pub source_repo: Option<String>,

    /// Glob pattern selecting the release asset
    #[serde(default)]
    pub asset_pattern: Option<String>,

    /// Whether the tool needs administrator/root rights
    #[serde(default)]
    pub requires_elevated_privileges: bool,

    /// Whether the last resolution found the executable
    #[serde(default)]
    pub installed: bool,

    /// License of the upstream tool
    #[serde(default)]
    pub license: String,
}

impl ToolInfo {
    /// Create a tool definition with the minimum identity fields
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        exe_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            exe_name: exe_name.into(),
            version: None,
            path: None,
            expected_hash: None,
            install_method: InstallMethod::default(),
            source_repo: None,
            asset_pattern: None,
            requires_elevated_privileges: false,
            installed: false,
            license: String::new(),
        }
    }

    /// Set the install method
    #[must_use]
    pub fn install_method(mut self, method: InstallMethod) -> Self {
        self.install_method = method;
        self
    }

    /// Set the release source and asset pattern
    #[must_use]
    pub fn release(mut self, repo: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.install_method = InstallMethod::ReleaseDownload;
        self.source_repo = Some(repo.into());
        self.asset_pattern = Some(pattern.into());
        self
    }

    /// Mark the tool as requiring elevated privileges
    #[must_use]
    pub const fn elevated(mut self, elevated: bool) -> Self {
        self.requires_elevated_privileges = elevated;
        self
    }

    /// Set the license
    #[must_use]
    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    /// Returns true if the tool can be fetched automatically
    #[must_use]
    pub const fn can_download(&self) -> bool {
        self.install_method.is_downloadable() && self.source_repo.is_some()
    }

    /// Mark as resolved at `path`
    #[must_use]
    pub fn resolved(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self.installed = true;
        self
    }

    /// Mark as not found
    #[must_use]
    pub fn unresolved(mut self) -> Self {
        self.path = None;
        self.installed = false;
        self
    }
}
