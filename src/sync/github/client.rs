use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::sync::config::RemoteConfig;
use crate::sync::remote::{RemoteError, RemoteStore, WriteReceipt};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";

const USER_AGENT: &str = concat!("photo-archive/", env!("CARGO_PKG_VERSION"));
const JSON_ACCEPT: &str = "application/vnd.github+json";
const RAW_ACCEPT: &str = "application/vnd.github.raw+json";

/// REST client for a repository hosted on GitHub
pub struct GitHubClient {
    client: Client,
    api_base: Url,
    raw_base: Url,
    config: RemoteConfig,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsMeta {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    commit: PutCommit,
}

#[derive(Debug, Deserialize)]
struct PutCommit {
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
}

impl GitHubClient {
    /// Create a client against the public GitHub endpoints
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        Self::with_endpoints(config, DEFAULT_API_URL, DEFAULT_RAW_URL)
    }

    /// Create a client against custom API and raw-content base URLs
    pub fn with_endpoints(
        config: RemoteConfig,
        api_base: &str,
        raw_base: &str,
    ) -> Result<Self, RemoteError> {
        let api_base = parse_base(api_base)?;
        let raw_base = parse_base(raw_base)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base,
            raw_base,
            config,
        })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn token(&self) -> Option<&str> {
        self.config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// `{api}/repos/{owner}/{repo}/{tail...}`
    fn repo_url<'s>(&self, tail: impl IntoIterator<Item = &'s str>) -> Result<Url, RemoteError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str()])
            .extend(tail);
        Ok(url)
    }

    fn contents_url(&self, path: &str) -> Result<Url, RemoteError> {
        self.repo_url(std::iter::once("contents").chain(path_segments(path)))
    }

    /// `{raw}/{owner}/{repo}/{reference}/{path}`
    fn raw_url(&self, path: &str, reference: &str) -> Result<Url, RemoteError> {
        let mut url = self.raw_base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.raw_base.to_string()))?
            .pop_if_empty()
            .extend([self.config.owner.as_str(), self.config.repo.as_str(), reference])
            .extend(path_segments(path));
        Ok(url)
    }

    /// Current blob id of `path` on the configured branch, the token a
    /// conditional write needs. `None` if the file does not exist yet.
    pub async fn read_file_sha(&self, path: &str) -> Result<Option<String>, RemoteError> {
        let url = self.contents_url(path)?;

        let response = self
            .authorize(self.client.get(url))
            .header(ACCEPT, JSON_ACCEPT)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let meta: ContentsMeta = response.json().await?;
        Ok(Some(meta.sha))
    }

    /// PUT the whole file. `sha` must be the blob id the caller last read;
    /// a stale one is rejected by the server as a conflict.
    pub async fn put_contents(
        &self,
        path: &str,
        text: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<WriteReceipt, RemoteError> {
        if self.token().is_none() {
            return Err(RemoteError::ReadOnly);
        }

        let url = self.contents_url(path)?;
        let body = PutContentsRequest {
            message,
            content: BASE64.encode(text),
            sha,
            branch: &self.config.branch,
        };

        let response = self
            .authorize(self.client.put(url))
            .header(ACCEPT, JSON_ACCEPT)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let put: PutContentsResponse = response.json().await?;
                log::info!("Wrote {} as commit {}", path, put.commit.sha);
                Ok(WriteReceipt {
                    revision_id: put.commit.sha,
                    html_url: put.commit.html_url,
                })
            }
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                log::warn!("Write to {} rejected: revision token is stale", path);
                Err(RemoteError::Conflict(path.to_string()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::AuthFailed),
            status => Err(RemoteError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl RemoteStore for GitHubClient {
    async fn read_commit_head(&self, reference: &str) -> Result<String, RemoteError> {
        let url = self.repo_url(["commits", reference])?;

        let response = self
            .authorize(self.client.get(url))
            .header(ACCEPT, JSON_ACCEPT)
            .send()
            .await?;

        let response = check_status(response).await?;
        let commit: CommitRef = response.json().await?;
        Ok(commit.sha)
    }

    async fn read_file_history(
        &self,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>, RemoteError> {
        let url = self.repo_url(["commits"])?;

        let response = self
            .authorize(self.client.get(url))
            .header(ACCEPT, JSON_ACCEPT)
            .query(&[("path", path), ("sha", reference), ("per_page", "1")])
            .send()
            .await?;

        let response = check_status(response).await?;
        let commits: Vec<CommitRef> = response.json().await?;
        Ok(commits.into_iter().next().map(|c| c.sha))
    }

    async fn read_file(&self, path: &str, reference: &str) -> Result<Option<String>, RemoteError> {
        let request = if self.token().is_some() {
            self.authorize(self.client.get(self.contents_url(path)?))
                .header(ACCEPT, RAW_ACCEPT)
                .query(&[("ref", reference)])
        } else {
            // Anonymous reads go through the raw-content host, which is not
            // subject to the API rate limit
            self.client.get(self.raw_url(path, reference)?)
        };

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("{} not found at {}", path, reference);
            return Ok(None);
        }

        let response = check_status(response).await?;
        Ok(Some(response.text().await?))
    }

    async fn write_file(
        &self,
        path: &str,
        text: &str,
        message: &str,
    ) -> Result<WriteReceipt, RemoteError> {
        if self.token().is_none() {
            return Err(RemoteError::ReadOnly);
        }
        let current = self.read_file_sha(path).await?;
        self.put_contents(path, text, message, current.as_deref())
            .await
    }

    fn can_write(&self) -> bool {
        self.token().is_some()
    }
}

fn parse_base(base: &str) -> Result<Url, RemoteError> {
    let base = base.trim_end_matches('/');
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err(RemoteError::InvalidUrl(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    Url::parse(base).map_err(|e| RemoteError::InvalidUrl(e.to_string()))
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::AuthFailed),
        status if !status.is_success() => Err(RemoteError::Server {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        }),
        _ => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, PUT};
    use httpmock::MockServer;
    use serde_json::json;

    const PATH: &str = "src/data/chapters.js";

    fn client(server: &MockServer, token: Option<&str>) -> GitHubClient {
        let mut config = RemoteConfig::new("ana", "memories");
        config.token = token.map(str::to_string);
        GitHubClient::with_endpoints(config, &server.base_url(), &server.url("/raw")).unwrap()
    }

    #[tokio::test]
    async fn test_read_commit_head() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/ana/memories/commits/main")
                    .header("authorization", "Bearer tok");
                then.status(200).json_body(json!({ "sha": "abc123", "commit": {} }));
            })
            .await;

        let head = client(&server, Some("tok")).read_commit_head("main").await.unwrap();
        assert_eq!(head, "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_file_history() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/ana/memories/commits")
                    .query_param("path", PATH)
                    .query_param("sha", "main")
                    .query_param("per_page", "1");
                then.status(200).json_body(json!([{ "sha": "def456" }]));
            })
            .await;

        let latest = client(&server, None)
            .read_file_history(PATH, "main")
            .await
            .unwrap();
        assert_eq!(latest.as_deref(), Some("def456"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_file_history_without_commits() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/ana/memories/commits");
                then.status(200).json_body(json!([]));
            })
            .await;

        let latest = client(&server, None)
            .read_file_history("never.json", "main")
            .await
            .unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn test_authenticated_read_uses_contents_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/ana/memories/contents/src/data/chapters.js")
                    .query_param("ref", "abc123")
                    .header("accept", RAW_ACCEPT);
                then.status(200).body("export const chapters = [];");
            })
            .await;

        let text = client(&server, Some("tok")).read_file(PATH, "abc123").await.unwrap();
        assert_eq!(text.as_deref(), Some("export const chapters = [];"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_anonymous_read_uses_raw_host() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/raw/ana/memories/main/src/data/chapters.js");
                then.status(200).body("raw text");
            })
            .await;

        let text = client(&server, None).read_file(PATH, "main").await.unwrap();
        assert_eq!(text.as_deref(), Some("raw text"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/raw/ana/memories/main/src/data/chapters.json");
                then.status(404).body("404: Not Found");
            })
            .await;

        let text = client(&server, None)
            .read_file("src/data/chapters.json", "main")
            .await
            .unwrap();
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn test_write_file_sends_current_sha() {
        let server = MockServer::start_async().await;
        let text = "export const chapters = [];";

        let meta = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/ana/memories/contents/src/data/chapters.js")
                    .query_param("ref", "main");
                then.status(200).json_body(json!({ "sha": "blob-1", "path": PATH }));
            })
            .await;
        let put = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/repos/ana/memories/contents/src/data/chapters.js")
                    .header("authorization", "Bearer tok")
                    .json_body_partial(
                        json!({
                            "message": "Update archive",
                            "content": BASE64.encode(text),
                            "sha": "blob-1",
                            "branch": "main",
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({
                    "content": { "sha": "blob-2" },
                    "commit": { "sha": "commit-2", "html_url": "https://github.com/ana/memories/commit/commit-2" }
                }));
            })
            .await;

        let receipt = client(&server, Some("tok"))
            .write_file(PATH, text, "Update archive")
            .await
            .unwrap();

        assert_eq!(receipt.revision_id, "commit-2");
        assert!(receipt.html_url.is_some());
        meta.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_new_file_is_written_without_sha() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/ana/memories/contents/new.json");
                then.status(404);
            })
            .await;
        let put = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/repos/ana/memories/contents/new.json")
                    .matches(|req| {
                        let body: serde_json::Value =
                            serde_json::from_slice(req.body.as_deref().unwrap_or_default())
                                .unwrap_or_default();
                        body.get("branch").is_some() && body.get("sha").is_none()
                    });
                then.status(201).json_body(json!({ "commit": { "sha": "commit-1" } }));
            })
            .await;

        let receipt = client(&server, Some("tok"))
            .write_file("new.json", "[]", "Create")
            .await
            .unwrap();
        assert_eq!(receipt.revision_id, "commit-1");
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_stale_sha_is_conflict() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/repos/ana/memories/contents/src/data/chapters.js");
                then.status(409).json_body(json!({ "message": "is at abc but expected def" }));
            })
            .await;

        let err = client(&server, Some("tok"))
            .put_contents(PATH, "x", "msg", Some("def"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(ref p) if p == PATH));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/ana/memories/commits/main");
                then.status(401);
            })
            .await;

        let err = client(&server, Some("bad")).read_commit_head("main").await.unwrap_err();
        assert!(matches!(err, RemoteError::AuthFailed));
    }

    #[tokio::test]
    async fn test_anonymous_write_is_read_only() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|_when, then| {
                then.status(500);
            })
            .await;

        let remote = client(&server, None);
        assert!(!remote.can_write());
        let err = remote.write_file(PATH, "x", "msg").await.unwrap_err();
        assert!(matches!(err, RemoteError::ReadOnly));
        assert_eq!(any.hits_async().await, 0);
    }

    #[test]
    fn test_rejects_non_http_base() {
        let config = RemoteConfig::new("ana", "memories");
        assert!(matches!(
            GitHubClient::with_endpoints(config, "ftp://example.com", DEFAULT_RAW_URL),
            Err(RemoteError::InvalidUrl(_))
        ));
    }
}
