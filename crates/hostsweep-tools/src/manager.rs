//! Tool registry, resolution and acquisition.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use hostsweep_core::{Result, SweepError, ToolInfo};

use crate::archive::{extract_zip, files_under, fixup_exe_name};
use crate::catalog::default_tools;
use crate::config::{SweepConfig, ToolOverride};
use crate::hash::{digest_matches, sha256_file};
use crate::release::{find_matching_asset, ReleaseClient};

/// Remediation text shown when a tool cannot be located
#[must_use]
pub fn install_hint(tool: &ToolInfo) -> String {
    if tool.can_download() {
        format!(
            "Run `hostsweep setup --tool {}` or set `tools.{}.path` in the config file.",
            tool.name, tool.name
        )
    } else {
        format!(
            "Install it manually ({}) and set `tools.{}.path` in the config file.",
            tool.install_method, tool.name
        )
    }
}

/// Registry of external tools and the on-disk locations they resolve to.
///
/// Resolution is recomputed on every call, so a tool installed or removed
/// while the process runs is picked up by the next check.
pub struct ToolManager {
    tools_dir: PathBuf,
    registry: BTreeMap<String, ToolInfo>,
    search_path: Option<OsString>,
    release: Option<ReleaseClient>,
}

impl std::fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolManager")
            .field("tools_dir", &self.tools_dir)
            .field("tools", &self.registry.keys().collect::<Vec<_>>())
            .field("search_path", &self.search_path)
            .finish_non_exhaustive()
    }
}

impl ToolManager {
    /// Create a manager with the built-in catalog and `config` applied
    #[must_use]
    pub fn new(config: &SweepConfig) -> Self {
        ToolManagerBuilder::new().config(config).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> ToolManagerBuilder {
        ToolManagerBuilder::new()
    }

    /// Root directory holding downloaded tools
    #[must_use]
    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    /// Registered tool names, sorted
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    /// Registry entry for `name` without resolving it
    pub fn get_tool_info(&self, name: &str) -> Result<ToolInfo> {
        self.registry
            .get(name)
            .cloned()
            .ok_or_else(|| SweepError::UnknownTool(name.to_string()))
    }

    /// Resolve `name` against the filesystem and search path.
    ///
    /// A registered tool that cannot be found is returned with
    /// `installed == false` and no path.
    pub fn check_tool(&self, name: &str) -> Result<ToolInfo> {
        let entry = self.get_tool_info(name)?;
        let resolved = self.resolve(&entry);

        match resolved {
            Some(path) => {
                debug!(tool = %name, path = %path.display(), "Tool resolved");
                Ok(entry.resolved(path))
            }
            None => {
                debug!(tool = %name, exe = %entry.exe_name, "Tool not found");
                Ok(entry.unresolved())
            }
        }
    }

    /// Resolve every registered tool
    #[must_use]
    pub fn check_all_tools(&self) -> BTreeMap<String, ToolInfo> {
        self.registry
            .values()
            .map(|entry| {
                let info = match self.resolve(entry) {
                    Some(path) => entry.clone().resolved(path),
                    None => entry.clone().unresolved(),
                };
                (entry.name.clone(), info)
            })
            .collect()
    }

    /// Executable path for `name`, or [`SweepError::ToolNotFound`] with a hint
    pub fn get_tool_path(&self, name: &str) -> Result<PathBuf> {
        let info = self.check_tool(name)?;
        match info.path {
            Some(path) if info.installed => Ok(path),
            _ => Err(SweepError::ToolNotFound {
                hint: install_hint(&info),
                tool: info.name,
                display_name: info.display_name,
                exe_name: info.exe_name,
            }),
        }
    }

    /// Compare the resolved binary against its pinned SHA-256.
    ///
    /// `true` when nothing is pinned or the digest matches; `false` on
    /// mismatch, unreadable file, or when the tool is not installed.
    pub async fn verify_tool_integrity(&self, name: &str) -> Result<bool> {
        let info = self.check_tool(name)?;
        let Some(path) = info.path.as_deref().filter(|_| info.installed) else {
            return Ok(false);
        };
        let Some(expected) = info.expected_hash.as_deref() else {
            return Ok(true);
        };

        match sha256_file(path).await {
            Ok(actual) if digest_matches(expected, &actual) => Ok(true),
            Ok(actual) => {
                warn!(
                    tool = %name,
                    path = %path.display(),
                    expected = %expected,
                    actual = %actual,
                    "Integrity mismatch"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Failed to hash tool binary");
                Ok(false)
            }
        }
    }

    /// Fetch the latest release build of `name` into `<tools_dir>/<name>/`.
    ///
    /// Returns `Ok(false)` for tools that cannot be downloaded and for every
    /// network or filesystem failure; only an unknown name is an error.
    pub async fn download_tool(&self, name: &str) -> Result<bool> {
        let tool = self.get_tool_info(name)?;

        if !tool.install_method.is_downloadable() {
            info!(
                tool = %name,
                method = %tool.install_method,
                "Tool cannot be downloaded automatically; install it manually"
            );
            return Ok(false);
        }
        let (Some(repo), Some(pattern)) = (tool.source_repo.as_deref(), tool.asset_pattern.as_deref())
        else {
            warn!(tool = %name, "No release source configured");
            return Ok(false);
        };

        if let Err(e) = self.install_release(&tool, repo, pattern).await {
            error!(tool = %name, repo = %repo, error = %e, "Download failed");
            return Ok(false);
        }

        let info = self.check_tool(name)?;
        match info.path {
            Some(path) if info.installed => {
                info!(tool = %name, path = %path.display(), "Tool installed");
                Ok(true)
            }
            _ => {
                error!(
                    tool = %name,
                    exe = %tool.exe_name,
                    dir = %self.tools_dir.join(name).display(),
                    "Downloaded but executable not found"
                );
                Ok(false)
            }
        }
    }

    /// Download every missing tool that supports it.
    ///
    /// With `skip_existing`, tools that already resolve count as successes.
    pub async fn bootstrap_all(&self, skip_existing: bool) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();

        for name in self.registry.keys() {
            if skip_existing && self.check_tool(name).is_ok_and(|t| t.installed) {
                info!(tool = %name, "Already installed, skipping");
                results.insert(name.clone(), true);
                continue;
            }

            let ok = match self.registry.get(name) {
                Some(tool) if tool.can_download() => {
                    self.download_tool(name).await.unwrap_or(false)
                }
                _ => {
                    info!(tool = %name, "Manual installation required");
                    false
                }
            };
            results.insert(name.clone(), ok);
        }

        results
    }

    fn resolve(&self, tool: &ToolInfo) -> Option<PathBuf> {
        if let Some(path) = tool.path.as_deref() {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
            debug!(tool = %tool.name, path = %path.display(), "Configured path is not a file");
        }

        let tool_dir = self.tools_dir.join(&tool.name);
        let direct = tool_dir.join(&tool.exe_name);
        if direct.is_file() {
            return Some(direct);
        }
        if tool_dir.is_dir() {
            if let Some(nested) =
                files_under(&tool_dir).find(|p| p.file_name().is_some_and(|n| n == tool.exe_name.as_str()))
            {
                return Some(nested);
            }
        }

        let flat = self.tools_dir.join(&tool.exe_name);
        if flat.is_file() {
            return Some(flat);
        }

        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(&tool.exe_name, Some(search_path), cwd).ok()
    }

    async fn install_release(&self, tool: &ToolInfo, repo: &str, pattern: &str) -> Result<PathBuf> {
        let client = match &self.release {
            Some(client) => client.clone(),
            None => ReleaseClient::new()?,
        };

        let release = client.latest_release(repo).await?;
        let asset = find_matching_asset(&release, pattern).ok_or_else(|| SweepError::AssetNotFound {
            repo: repo.to_string(),
            pattern: pattern.to_string(),
        })?;
        if asset.name.contains(['/', '\\']) || asset.name.starts_with('.') {
            return Err(SweepError::Download(format!(
                "refusing asset name '{}'",
                asset.name
            )));
        }

        let dest_dir = self.tools_dir.join(&tool.name);
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|e| SweepError::io(&dest_dir, e))?;

        info!(tool = %tool.name, asset = %asset.name, release = %release.tag_name, "Downloading");
        let asset_path = dest_dir.join(&asset.name);
        client
            .download_to(&asset.browser_download_url, &asset_path)
            .await?;

        let is_zip = Path::new(&asset.name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        let exe_name = tool.exe_name.clone();
        let dir = dest_dir.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            if is_zip {
                extract_zip(&asset_path, &dir)?;
                std::fs::remove_file(&asset_path).map_err(|e| SweepError::io(&asset_path, e))?;
            }
            fixup_exe_name(&dir, &exe_name);
            Ok(())
        })
        .await
        .map_err(|e| SweepError::Download(e.to_string()))??;

        Ok(dest_dir)
    }
}

/// Builder for configuring a [`ToolManager`]
pub struct ToolManagerBuilder {
    tools_dir: PathBuf,
    overrides: BTreeMap<String, ToolOverride>,
    extra: Vec<ToolInfo>,
    search_path: Option<OsString>,
    release: Option<ReleaseClient>,
}

impl Default for ToolManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolManagerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools_dir: SweepConfig::default().tools_dir,
            overrides: BTreeMap::new(),
            extra: Vec::new(),
            search_path: None,
            release: None,
        }
    }

    /// Take `tools_dir` and per-tool overrides from `config`
    #[must_use]
    pub fn config(mut self, config: &SweepConfig) -> Self {
        self.tools_dir.clone_from(&config.tools_dir);
        self.overrides.clone_from(&config.tools);
        self
    }

    /// Set the tools directory
    #[must_use]
    pub fn tools_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tools_dir = dir.into();
        self
    }

    /// Apply an override to one tool
    #[must_use]
    pub fn tool_override(mut self, name: impl Into<String>, over: ToolOverride) -> Self {
        self.overrides.insert(name.into(), over);
        self
    }

    /// Register an additional tool, replacing a catalog entry of the same name
    #[must_use]
    pub fn tool(mut self, tool: ToolInfo) -> Self {
        self.extra.push(tool);
        self
    }

    /// Search path used instead of the process `PATH`
    #[must_use]
    pub fn search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Release client used for downloads
    #[must_use]
    pub fn release_client(mut self, client: ReleaseClient) -> Self {
        self.release = Some(client);
        self
    }

    /// Build the manager
    #[must_use]
    pub fn build(self) -> ToolManager {
        let mut registry: BTreeMap<String, ToolInfo> = default_tools()
            .into_iter()
            .chain(self.extra)
            .map(|t| (t.name.clone(), t))
            .collect();

        for (name, over) in &self.overrides {
            match registry.get_mut(name) {
                Some(tool) => over.apply(tool),
                None => warn!(tool = %name, "Override for unknown tool ignored"),
            }
        }

        ToolManager {
            tools_dir: self.tools_dir,
            registry,
            search_path: self.search_path,
            release: self.release,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(dir: &Path) -> ToolManager {
        ToolManager::builder()
            .tools_dir(dir.join("tools"))
            .search_path(dir.join("bin"))
            .build()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"MZ").unwrap();
    }

    #[test]
    fn test_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tools = manager(dir.path());
        assert!(matches!(
            tools.check_tool("nmap"),
            Err(SweepError::UnknownTool(_))
        ));
        assert!(matches!(
            tools.get_tool_path("nmap"),
            Err(SweepError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_absent_tool_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let tools = manager(dir.path());
        let info = tools.check_tool("hayabusa").unwrap();
        assert!(!info.installed);
        assert!(info.path.is_none());

        let err = tools.get_tool_path("hayabusa").unwrap_err();
        assert!(matches!(err, SweepError::ToolNotFound { .. }));
        assert!(err.to_string().contains("hostsweep setup --tool hayabusa"));
    }

    #[test]
    fn test_tools_dir_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let tools = manager(dir.path());
        let root = dir.path().join("tools");

        touch(&root.join("chainsaw.exe"));
        assert_eq!(
            tools.get_tool_path("chainsaw").unwrap(),
            root.join("chainsaw.exe")
        );

        touch(&root.join("chainsaw").join("b").join("chainsaw.exe"));
        touch(&root.join("chainsaw").join("a").join("chainsaw.exe"));
        assert_eq!(
            tools.get_tool_path("chainsaw").unwrap(),
            root.join("chainsaw").join("a").join("chainsaw.exe")
        );

        touch(&root.join("chainsaw").join("chainsaw.exe"));
        assert_eq!(
            tools.get_tool_path("chainsaw").unwrap(),
            root.join("chainsaw").join("chainsaw.exe")
        );
    }

    #[test]
    fn test_configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom").join("clamscan.exe");
        touch(&custom);
        touch(&dir.path().join("tools").join("clamav").join("clamscan.exe"));

        let tools = ToolManager::builder()
            .tools_dir(dir.path().join("tools"))
            .search_path(dir.path().join("bin"))
            .tool_override(
                "clamav",
                ToolOverride {
                    path: Some(custom.clone()),
                    ..ToolOverride::default()
                },
            )
            .build();
        assert_eq!(tools.get_tool_path("clamav").unwrap(), custom);
    }

    #[test]
    fn test_missing_configured_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("tools").join("clamav").join("clamscan.exe");
        touch(&fallback);

        let tools = ToolManager::builder()
            .tools_dir(dir.path().join("tools"))
            .search_path(dir.path().join("bin"))
            .tool_override(
                "clamav",
                ToolOverride {
                    path: Some(dir.path().join("nope.exe")),
                    ..ToolOverride::default()
                },
            )
            .build();
        assert_eq!(tools.get_tool_path("clamav").unwrap(), fallback);
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_is_last_resort() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin").join("yr.exe");
        touch(&bin);
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();

        let tools = manager(dir.path());
        assert_eq!(tools.get_tool_path("yara_x").unwrap(), bin);

        let local = dir.path().join("tools").join("yara_x").join("yr.exe");
        touch(&local);
        assert_eq!(tools.get_tool_path("yara_x").unwrap(), local);
    }

    #[test]
    fn test_extra_tool_registration() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolManager::builder()
            .tools_dir(dir.path().join("tools"))
            .search_path(dir.path().join("bin"))
            .tool(ToolInfo::new("mock", "Mock Tool", "mock.sh"))
            .build();
        assert!(tools.tool_names().contains(&"mock".to_string()));
        assert_eq!(tools.tool_names().len(), 12);
        assert!(!tools.check_tool("mock").unwrap().installed);
        assert_eq!(tools.check_all_tools().len(), 12);
    }

    #[tokio::test]
    async fn test_verify_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tools").join("sigcheck").join("sigcheck64.exe");
        fs::create_dir_all(exe.parent().unwrap()).unwrap();
        let mut f = fs::File::create(&exe).unwrap();
        write!(f, "hello world").unwrap();

        let pinned = |hash: &str| {
            ToolManager::builder()
                .tools_dir(dir.path().join("tools"))
                .search_path(dir.path().join("bin"))
                .tool_override(
                    "sigcheck",
                    ToolOverride {
                        expected_hash: Some(hash.to_string()),
                        ..ToolOverride::default()
                    },
                )
                .build()
        };

        assert!(manager(dir.path())
            .verify_tool_integrity("sigcheck")
            .await
            .unwrap());
        assert!(pinned("B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9")
            .verify_tool_integrity("sigcheck")
            .await
            .unwrap());
        assert!(!pinned("00")
            .verify_tool_integrity("sigcheck")
            .await
            .unwrap());
        assert!(!pinned("00")
            .verify_tool_integrity("listdlls")
            .await
            .unwrap());
        assert!(pinned("00").verify_tool_integrity("bogus").await.is_err());
    }

    #[tokio::test]
    async fn test_manual_tool_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let tools = manager(dir.path());
        assert!(!tools.download_tool("sysmon").await.unwrap());
        assert!(tools.download_tool("bogus").await.is_err());
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_download_extracts_and_renames() {
        let server = MockServer::start().await;
        let asset = "hayabusa-2.17.0-win-x64.zip";
        Mock::given(method("GET"))
            .and(path("/repos/Yamato-Security/hayabusa/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v2.17.0",
                "assets": [
                    {"name": "hayabusa-2.17.0-lin-x64-gnu.zip",
                     "browser_download_url": format!("{}/dl/linux.zip", server.uri())},
                    {"name": asset,
                     "browser_download_url": format!("{}/dl/{asset}", server.uri())}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/dl/{asset}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[
                ("hayabusa-2.17.0-win-x64.exe", b"MZ"),
                ("rules/config.yml", b"x: 1"),
            ])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = ReleaseClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();
        let tools = ToolManager::builder()
            .tools_dir(dir.path().join("tools"))
            .search_path(dir.path().join("bin"))
            .release_client(client)
            .build();

        assert!(tools.download_tool("hayabusa").await.unwrap());

        let tool_dir = dir.path().join("tools").join("hayabusa");
        assert_eq!(
            tools.get_tool_path("hayabusa").unwrap(),
            tool_dir.join("hayabusa.exe")
        );
        assert!(!tool_dir.join(asset).exists());
        assert!(tool_dir.join("rules").join("config.yml").is_file());
    }

    #[tokio::test]
    async fn test_download_failures_return_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/WithSecureLabs/chainsaw/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v2.10.1",
                "assets": [{"name": "chainsaw_all_platforms.zip",
                            "browser_download_url": "http://127.0.0.1:1/none"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/VirusTotal/yara-x/releases/latest"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = ReleaseClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();
        let tools = ToolManager::builder()
            .tools_dir(dir.path().join("tools"))
            .search_path(dir.path().join("bin"))
            .release_client(client)
            .build();

        assert!(!tools.download_tool("chainsaw").await.unwrap());
        assert!(!tools.download_tool("yara_x").await.unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_skips_installed_and_manual() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("tools").join("chainsaw").join("chainsaw.exe"));

        let client = ReleaseClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();
        let tools = ToolManager::builder()
            .tools_dir(dir.path().join("tools"))
            .search_path(dir.path().join("bin"))
            .release_client(client)
            .build();

        let results = tools.bootstrap_all(true).await;
        assert_eq!(results.len(), 11);
        assert_eq!(results.get("chainsaw"), Some(&true));
        assert_eq!(results.get("sysmon"), Some(&false));
        assert_eq!(results.get("hayabusa"), Some(&false));
        assert_eq!(results.get("clamav"), Some(&false));
    }
}
