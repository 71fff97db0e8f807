//! Release channel client.
//!
//! Queries the single rolling release tag for the latest published analyzer
//! build. Every failure mode - unreachable network, non-2xx, no matching
//! asset, unparseable body - collapses to `None` with a log line: callers
//! interpret absence conservatively ("no update, don't block startup") and
//! this component never raises past its boundary.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use sidekick_types::{BinaryIdentifier, ReleaseInfo};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";
const DEFAULT_REPO: &str = "sidekick-tools/analyzer";

/// The rolling tag that acts as the "latest" pointer.
const RELEASE_TAG: &str = "nightly";

pub(crate) fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("sidekick/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build HTTP client: {e}. Falling back to defaults.");
                reqwest::Client::new()
            })
    })
}

/// Where releases are published: an API endpoint for the index query and a
/// download endpoint for artifact bytes, scoped by repository and the
/// constant rolling tag.
#[derive(Debug, Clone)]
pub struct ReleaseChannel {
    api_base: String,
    download_base: String,
    repo: String,
    tag: String,
}

impl Default for ReleaseChannel {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            repo: DEFAULT_REPO.to_string(),
            tag: RELEASE_TAG.to_string(),
        }
    }
}

impl ReleaseChannel {
    /// A channel with explicit endpoints. Tests point this at a local mock
    /// server.
    #[must_use]
    pub fn custom(
        api_base: impl Into<String>,
        download_base: impl Into<String>,
        repo: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            download_base: download_base.into(),
            repo: repo.into(),
            tag: tag.into(),
        }
    }

    fn release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/tags/{}",
            self.api_base, self.repo, self.tag
        )
    }

    /// Artifact URL derived from repository, tag, and the identifier as
    /// filename.
    #[must_use]
    pub fn download_url(&self, identifier: &BinaryIdentifier) -> String {
        format!(
            "{}/{}/releases/download/{}/{}",
            self.download_base, self.repo, self.tag, identifier
        )
    }
}

#[derive(Deserialize)]
struct ReleaseIndex {
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Deserialize)]
struct ReleaseAsset {
    name: String,
    updated_at: DateTime<Utc>,
}

/// Client for the release index.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    channel: ReleaseChannel,
}

impl ReleaseClient {
    #[must_use]
    pub fn new(channel: ReleaseChannel) -> Self {
        Self { channel }
    }

    #[must_use]
    pub fn channel(&self) -> &ReleaseChannel {
        &self.channel
    }

    /// Latest release for `identifier`, or `None` when it cannot be
    /// determined.
    pub async fn fetch_latest(&self, identifier: &BinaryIdentifier) -> Option<ReleaseInfo> {
        let url = self.channel.release_url();
        let response = match http_client()
            .get(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Release index unreachable: {e}");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "Release index query failed");
            return None;
        }

        let index: ReleaseIndex = match response.json().await {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("Unparseable release index body: {e}");
                return None;
            }
        };

        let Some(asset) = index
            .assets
            .iter()
            .find(|asset| asset.name == identifier.as_str())
        else {
            tracing::warn!(
                tag = %index.tag_name,
                "Release has no asset named '{identifier}'"
            );
            return None;
        };

        Some(ReleaseInfo::new(index.tag_name, asset.updated_at))
    }
}

#[cfg(test)]
mod tests {
    use super::{ReleaseChannel, ReleaseClient};
    use sidekick_types::BinaryIdentifier;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id() -> BinaryIdentifier {
        BinaryIdentifier::new("analyzer-linux-x86_64")
    }

    fn channel_for(server: &MockServer) -> ReleaseChannel {
        ReleaseChannel::custom(server.uri(), server.uri(), "sidekick-tools/analyzer", "nightly")
    }

    #[test]
    fn download_url_derives_from_repo_tag_and_identifier() {
        let channel = ReleaseChannel::default();
        assert_eq!(
            channel.download_url(&id()),
            "https://github.com/sidekick-tools/analyzer/releases/download/nightly/analyzer-linux-x86_64"
        );
    }

    #[tokio::test]
    async fn fetch_latest_returns_matching_asset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/sidekick-tools/analyzer/releases/tags/nightly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "nightly",
                "assets": [
                    {
                        "name": "analyzer-macos-aarch64",
                        "updated_at": "2024-05-01T00:00:00Z",
                        "browser_download_url": "https://example.com/a"
                    },
                    {
                        "name": "analyzer-linux-x86_64",
                        "updated_at": "2024-05-02T08:30:00Z",
                        "browser_download_url": "https://example.com/b"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = ReleaseClient::new(channel_for(&server));
        let release = client.fetch_latest(&id()).await.expect("release");
        assert_eq!(release.tag_name(), "nightly");
        assert_eq!(
            release.published_at(),
            "2024-05-02T08:30:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn fetch_latest_is_absent_without_matching_asset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/sidekick-tools/analyzer/releases/tags/nightly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "nightly",
                "assets": [
                    { "name": "analyzer-windows-x86_64.exe", "updated_at": "2024-05-01T00:00:00Z" }
                ]
            })))
            .mount(&server)
            .await;

        let client = ReleaseClient::new(channel_for(&server));
        assert!(client.fetch_latest(&id()).await.is_none());
    }

    #[tokio::test]
    async fn fetch_latest_is_absent_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ReleaseClient::new(channel_for(&server));
        assert!(client.fetch_latest(&id()).await.is_none());
    }

    #[tokio::test]
    async fn fetch_latest_is_absent_on_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = ReleaseClient::new(channel_for(&server));
        assert!(client.fetch_latest(&id()).await.is_none());
    }

    #[tokio::test]
    async fn fetch_latest_is_absent_when_unreachable() {
        // Reserve a port, then drop the server so the address refuses.
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let channel = ReleaseChannel::custom(&uri, &uri, "sidekick-tools/analyzer", "nightly");
        let client = ReleaseClient::new(channel);
        assert!(client.fetch_latest(&id()).await.is_none());
    }
}
