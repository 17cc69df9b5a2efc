//! Release-host client used to fetch tool builds.

use glob::{MatchOptions, Pattern};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use hostsweep_core::{Result, SweepError};

/// Release API base URL
const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A published release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// First asset whose name matches `pattern`, ignoring case
#[must_use]
pub fn find_matching_asset<'a>(release: &'a Release, pattern: &str) -> Option<&'a ReleaseAsset> {
    let pattern = match Pattern::new(pattern) {
        Ok(p) => p,
        Err(e) => {
            warn!(pattern, error = %e, "Invalid asset pattern");
            return None;
        }
    };
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    release
        .assets
        .iter()
        .find(|asset| pattern.matches_with(&asset.name, options))
}

/// Client for the release API
#[derive(Clone)]
pub struct ReleaseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    base_url: String,
}

impl ReleaseClient {
    /// Create a client with default settings
    pub fn new() -> Result<Self> {
        ReleaseClientBuilder::new().build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> ReleaseClientBuilder {
        ReleaseClientBuilder::new()
    }

    /// Fetch the latest release of `repo` (`owner/name`)
    pub async fn latest_release(&self, repo: &str) -> Result<Release> {
        let url = format!("{}/repos/{repo}/releases/latest", self.inner.base_url);
        self.get_json(&url).await
    }

    /// Stream `url` into `dest`, returning the number of bytes written
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(url = %url, dest = %dest.display(), "Downloading asset");

        let mut response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SweepError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Self::handle_error(status.as_u16(), url, response).await;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| SweepError::io(dest, e))?;
        let mut written = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SweepError::Download(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| SweepError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| SweepError::io(dest, e))?;

        Ok(written)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| SweepError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| SweepError::Http(e.to_string()))?;
            serde_json::from_str(&body).map_err(SweepError::Json)
        } else {
            Self::handle_error(status.as_u16(), url, response).await
        }
    }

    /// Convert an error response to a `SweepError`
    async fn handle_error<T>(status: u16, url: &str, response: reqwest::Response) -> Result<T> {
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);

        match status {
            404 => Err(SweepError::NotFound {
                resource: url.to_string(),
            }),
            403 | 429 => {
                warn!(url = %url, "Rate limited by release host");
                Err(SweepError::RateLimited)
            }
            _ => Err(SweepError::Http(format!("{status}: {message}"))),
        }
    }
}

/// Builder for configuring a [`ReleaseClient`]
pub struct ReleaseClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for ReleaseClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("hostsweep/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the base URL (useful for testing)
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ReleaseClient> {
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| SweepError::Http(e.to_string()))?;

        Ok(ReleaseClient {
            inner: Arc::new(ClientInner {
                http,
                base_url: self.base_url,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release(names: &[&str]) -> Release {
        Release {
            tag_name: "v1.0".into(),
            name: None,
            assets: names
                .iter()
                .map(|n| ReleaseAsset {
                    name: (*n).to_string(),
                    browser_download_url: format!("https://example.invalid/{n}"),
                    size: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_asset_match_is_case_insensitive() {
        let rel = release(&[
            "hayabusa-2.17.0-lin-x64-gnu.zip",
            "Hayabusa-2.17.0-WIN-X64.zip",
            "hayabusa-2.17.0-win-x64.zip",
        ]);
        let asset = find_matching_asset(&rel, "hayabusa-*-win-x64.zip").unwrap();
        assert_eq!(asset.name, "Hayabusa-2.17.0-WIN-X64.zip");
    }

    #[test]
    fn test_asset_no_match() {
        let rel = release(&["chainsaw_all_platforms+rules.zip"]);
        assert!(find_matching_asset(&rel, "chainsaw_x86_64-pc-windows-msvc.zip").is_none());
    }

    #[tokio::test]
    async fn test_latest_release() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/WithSecureLabs/chainsaw/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v2.10.1",
                "assets": [{
                    "name": "chainsaw_x86_64-pc-windows-msvc.zip",
                    "browser_download_url": "https://example.invalid/c.zip",
                    "size": 1234
                }]
            })))
            .mount(&server)
            .await;

        let client = ReleaseClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();
        let rel = client
            .latest_release("WithSecureLabs/chainsaw")
            .await
            .unwrap();
        assert_eq!(rel.tag_name, "v2.10.1");
        assert_eq!(rel.assets.len(), 1);
        assert_eq!(rel.assets[0].size, 1234);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/a/missing/releases/latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/limited/releases/latest"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"message": "API rate limit exceeded"})),
            )
            .mount(&server)
            .await;

        let client = ReleaseClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();

        let err = client.latest_release("a/missing").await.unwrap_err();
        assert!(matches!(err, SweepError::NotFound { .. }));

        let err = client.latest_release("a/limited").await.unwrap_err();
        assert!(matches!(err, SweepError::RateLimited));
    }

    #[tokio::test]
    async fn test_download_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/tool.exe"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MZ\x90\x00".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tool.exe");
        let client = ReleaseClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();

        let n = client
            .download_to(&format!("{}/files/tool.exe", server.uri()), &dest)
            .await
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), b"MZ\x90\x00");
    }
}
