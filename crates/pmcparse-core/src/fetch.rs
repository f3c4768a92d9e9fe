//! Article page retrieval.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::{Config, FetchError};

/// Anything that can produce the decoded markup of an article page.
pub trait PageSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the page for `accession` (e.g. `PMC3148254`).
    fn fetch<'a>(
        &'a self,
        accession: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;
}

/// Fetches article pages from PMC over HTTP.
pub struct PmcPageSource {
    client: reqwest::Client,
    url_format: String,
    timeout: Duration,
}

impl PmcPageSource {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            url_format: config.article_url_format.clone(),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }

    pub fn article_url(&self, accession: &str) -> String {
        article_url(&self.url_format, accession)
    }
}

fn article_url(format: &str, accession: &str) -> String {
    format.replace("{}", accession.trim())
}

impl PageSource for PmcPageSource {
    fn name(&self) -> &str {
        "PMC"
    }

    fn fetch<'a>(
        &'a self,
        accession: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.article_url(accession);
            tracing::debug!(%url, "fetching article page");

            let resp = self.client.get(&url).timeout(self.timeout).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url,
                });
            }
            // Decoded with the charset of the Content-Type header, UTF-8 otherwise.
            Ok(resp.text().await?)
        })
    }
}

/// Serves one saved page from disk, whatever the accession.
pub struct FilePageSource {
    path: PathBuf,
}

impl FilePageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageSource for FilePageSource {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch<'a>(
        &'a self,
        _accession: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let bytes = tokio::fs::read(&self.path).await?;
            // Saved pages are not always UTF-8; keep what decodes.
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
    }
}
