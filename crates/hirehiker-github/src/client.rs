//! GitHub API client (tarball downloads)

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Public GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Refuse tarballs larger than this
pub const MAX_TARBALL_BYTES: usize = 50 * 1024 * 1024;

const USER_AGENT: &str = concat!("hirehiker/", env!("CARGO_PKG_VERSION"));

/// A repository plus the ref to download
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    /// Branch, tag or commit; `HEAD` means the default branch
    pub reference: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            reference: "HEAD".to_string(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Parse `owner/repo[@ref]`, also accepting a `https://github.com/` prefix
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix("https://github.com/")
            .or_else(|| s.strip_prefix("github.com/"))
            .unwrap_or(s);

        let (path, reference) = match s.split_once('@') {
            Some((path, reference)) => (path, Some(reference.trim())),
            None => (s, None),
        };

        let path = path.trim_end_matches('/').trim_end_matches(".git");
        let (owner, repo) = path
            .split_once('/')
            .with_context(|| format!("Expected owner/repo, got '{}'", s))?;

        if !valid_name(owner) || !valid_name(repo) {
            anyhow::bail!("Invalid repository '{}'", s);
        }

        let mut parsed = Self::new(owner, repo);
        if let Some(reference) = reference {
            if reference.is_empty() || reference.contains(char::is_whitespace) {
                anyhow::bail!("Invalid ref in '{}'", s);
            }
            parsed.reference = reference.to_string();
        }
        Ok(parsed)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.reference)
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// GitHub REST client
#[derive(Clone)]
pub struct GitHubClient {
    api_url: String,
    token: Option<SecretString>,
    max_bytes: usize,
    client: reqwest::Client,
}

impl GitHubClient {
    /// Create an anonymous client for the public API
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            max_bytes: MAX_TARBALL_BYTES,
            client,
        })
    }

    /// Authenticate requests (private repos, higher rate limits)
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::new(token.into()));
        self
    }

    /// Point at a different API host (GitHub Enterprise)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Lower the download size cap
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Download the gzip tarball of a repository at a ref
    pub async fn download_tarball(&self, repo: &RepoRef) -> Result<Vec<u8>> {
        let url = format!(
            "{}/repos/{}/{}/tarball/{}",
            self.api_url, repo.owner, repo.repo, repo.reference
        );
        debug!("Downloading {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let mut response = request
            .send()
            .await
            .with_context(|| format!("Failed to download {}", repo))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error ({}) for {}: {}", status, repo, body);
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                anyhow::bail!("Tarball for {} is too large ({} bytes)", repo, len);
            }
        }

        // No Content-Length on chunked responses; enforce the cap per chunk
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read tarball for {}", repo))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                anyhow::bail!("Tarball for {} is too large (over {} bytes)", repo, self.max_bytes);
            }
            bytes.extend_from_slice(&chunk);
        }

        info!("Downloaded {} ({} bytes)", repo, bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_ref() {
        let r = RepoRef::parse("acme/shop").unwrap();
        assert_eq!(r.owner, "acme");
        assert_eq!(r.repo, "shop");
        assert_eq!(r.reference, "HEAD");
        assert_eq!(r.to_string(), "acme/shop@HEAD");

        let r = RepoRef::parse("acme/shop@v1.2").unwrap();
        assert_eq!(r.reference, "v1.2");

        let r = RepoRef::parse("https://github.com/acme/shop.git").unwrap();
        assert_eq!(r.repo, "shop");
    }

    #[test]
    fn test_parse_rejects_bad_refs() {
        assert!(RepoRef::parse("shop").is_err());
        assert!(RepoRef::parse("acme/").is_err());
        assert!(RepoRef::parse("acme/shop/extra").is_err());
        assert!(RepoRef::parse("acme/../etc").is_err());
        assert!(RepoRef::parse("acme/shop@").is_err());
    }

    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::get,
        Router,
    };

    /// Serve `router` on an ephemeral local port and return its base URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Echo the request, except for the `broken` and `big` owners
    async fn fake_tarball(
        Path((owner, repo, reference)): Path<(String, String, String)>,
        headers: HeaderMap,
    ) -> Response {
        match owner.as_str() {
            "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
            "big" => vec![0u8; 4096].into_response(),
            _ => {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-")
                        .to_string()
                };
                format!(
                    "{}/{}@{} auth={} ua={}",
                    owner,
                    repo,
                    reference,
                    header("authorization"),
                    header("user-agent")
                )
                .into_response()
            }
        }
    }

    fn fake_api() -> Router {
        Router::new().route("/repos/:owner/:repo/tarball/:reference", get(fake_tarball))
    }

    #[tokio::test]
    async fn test_download_tarball_request_shape() {
        let base = serve(fake_api()).await;
        let client = GitHubClient::new().unwrap().with_api_url(&base).with_token("s3cret");

        let body = client
            .download_tarball(&RepoRef::parse("acme/shop@v2").unwrap())
            .await
            .unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(body.starts_with("acme/shop@v2 auth=Bearer s3cret ua=hirehiker/"));

        let anonymous = GitHubClient::new().unwrap().with_api_url(&base);
        let body = anonymous
            .download_tarball(&RepoRef::new("acme", "shop"))
            .await
            .unwrap();
        assert!(String::from_utf8(body).unwrap().contains("auth=-"));
    }

    #[tokio::test]
    async fn test_download_tarball_error_statuses() {
        let base = serve(fake_api()).await;
        let client = GitHubClient::new().unwrap().with_api_url(&base);

        // Extra path segment matches no route
        let err = client
            .download_tarball(&RepoRef::new("acme", "shop").with_reference("a/b"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));

        let err = client
            .download_tarball(&RepoRef::new("broken", "repo"))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_download_tarball_size_cap() {
        let base = serve(fake_api()).await;
        let client = GitHubClient::new().unwrap().with_api_url(&base);
        let repo = RepoRef::new("big", "repo");

        assert_eq!(client.download_tarball(&repo).await.unwrap().len(), 4096);

        let capped = client.with_max_bytes(1024);
        let err = capped.download_tarball(&repo).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    /// One-shot HTTP server that streams `chunks` chunks of 1 KiB without a Content-Length
    async fn serve_chunked(chunks: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let mut response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
            for _ in 0..chunks {
                response.extend_from_slice(b"400\r\n");
                response.extend(std::iter::repeat(b'z').take(1024));
                response.extend_from_slice(b"\r\n");
            }
            response.extend_from_slice(b"0\r\n\r\n");
            // The client may hang up once it hits the cap
            let _ = socket.write_all(&response).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_download_tarball_size_cap_without_length() {
        let repo = RepoRef::new("acme", "shop");

        let client = GitHubClient::new()
            .unwrap()
            .with_api_url(serve_chunked(8).await)
            .with_max_bytes(4 * 1024);
        let err = client.download_tarball(&repo).await.unwrap_err();
        assert!(err.to_string().contains("too large"));

        let client = GitHubClient::new()
            .unwrap()
            .with_api_url(serve_chunked(3).await)
            .with_max_bytes(4 * 1024);
        assert_eq!(client.download_tarball(&repo).await.unwrap().len(), 3 * 1024);
    }

    #[test]
    fn test_client_config() {
        let client = GitHubClient::new()
            .unwrap()
            .with_api_url("https://ghe.example.com/api/v3/")
            .with_token("t");
        assert_eq!(client.api_url(), "https://ghe.example.com/api/v3");
        assert!(client.has_token());
    }
}
