//! Source page client for the quizbowl database front page.
//!
//! Fetches the raw HTML (over HTTP, or from a local fixture in test mode)
//! and parses it into a [`common::Snapshot`].

pub mod parse;

pub use parse::PageParser;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::{SourceConfig, TimingConfig};
use common::{Error, Result};
use tracing::debug;

/// Raw page body plus the instant it was retrieved.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Anything that can hand back the current source document.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Retrieve the document. Errors are returned as-is for the caller to handle.
    async fn fetch(&self) -> Result<FetchedPage>;

    /// Human-readable origin for logging.
    fn describe(&self) -> String;
}

/// Pick the HTTP client or the fixture reader based on `test_mode`.
pub fn source_from_config(
    source: &SourceConfig,
    timing: &TimingConfig,
) -> Result<Arc<dyn PageSource>> {
    if source.test_mode {
        Ok(Arc::new(FixtureSource::new(&source.fixture_path)))
    } else {
        let timeout = Duration::from_secs(timing.fetch_timeout_secs);
        Ok(Arc::new(HsqbClient::new(
            &source.url,
            &source.user_agent,
            timeout,
        )?))
    }
}

// ── HTTP ──────────────────────────────────────────────────────────────

/// HTTP client with connection pooling and User-Agent header.
#[derive(Debug, Clone)]
pub struct HsqbClient {
    client: reqwest::Client,
    url: String,
}

impl HsqbClient {
    pub fn new(url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(2)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PageSource for HsqbClient {
    async fn fetch(&self) -> Result<FetchedPage> {
        debug!("Fetching source page: {}", self.url);

        let resp = self
            .client
            .get(&self.url)
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("HTTP error for {}: {}", self.url, e)))?;
        let fetched_at = Utc::now();

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(500).collect();
            return Err(Error::Fetch(format!(
                "{} returned {}: {}",
                self.url,
                status.as_u16(),
                snippet
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("body read error for {}: {}", self.url, e)))?;

        debug!("Got {} bytes from {}", body.len(), self.url);

        Ok(FetchedPage { body, fetched_at })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// ── Fixture ───────────────────────────────────────────────────────────

/// Reads a fixed local HTML file instead of performing network I/O.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    path: PathBuf,
}

impl FixtureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for FixtureSource {
    async fn fetch(&self) -> Result<FetchedPage> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Fetch(format!("fixture {} unreadable: {}", self.path.display(), e))
        })?;

        Ok(FetchedPage {
            body,
            fetched_at: Utc::now(),
        })
    }

    fn describe(&self) -> String {
        format!("fixture:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HsqbClient {
        HsqbClient::new(
            &format!("{}/db/", server.uri()),
            "primed-test",
            Duration::from_secs(5),
        )
        .expect("client should build")
    }

    #[tokio::test]
    async fn test_fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/db/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let before = Utc::now();
        let page = client_for(&server).fetch().await.expect("fetch should succeed");

        assert_eq!(page.body, "<html>ok</html>");
        assert!(page.fetched_at >= before);
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/db/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch().await.unwrap_err();

        assert!(matches!(err, Error::Fetch(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fixture_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "<html><body>fixture</body></html>").expect("write fixture");

        let source = FixtureSource::new(file.path());
        let page = source.fetch().await.expect("fixture should load");

        assert!(page.body.contains("fixture"));
        assert!(source.describe().starts_with("fixture:"));
    }

    #[tokio::test]
    async fn test_missing_fixture_is_fetch_error() {
        let source = FixtureSource::new("does/not/exist.html");
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[test]
    fn test_source_from_config_honours_test_mode() {
        let source = SourceConfig {
            test_mode: true,
            fixture_path: "fixtures/hsqb_front_page.html".into(),
            ..SourceConfig::default()
        };
        let picked = source_from_config(&source, &TimingConfig::default()).expect("source");
        assert_eq!(picked.describe(), "fixture:fixtures/hsqb_front_page.html");
    }
}
