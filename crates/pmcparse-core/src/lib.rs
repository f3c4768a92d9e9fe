use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub mod article;
pub mod config_file;
pub mod extract;
pub mod fetch;
pub mod landmarks;
pub mod model;
pub mod normalize;
pub mod oracle;

// Re-export for convenience
pub use article::{ArticleOutcome, parse_article};
pub use extract::{
    ExtractionResult, MarkupEvent, PaperExtractor, Strategy, StreamExtractor, TreeExtractor,
};
pub use fetch::{FilePageSource, PageSource, PmcPageSource};
pub use model::{NormalizedCitation, Paper, PaperKind, Reference};
pub use normalize::{CitationNormalizer, NormalizationReport, ReferenceFailure, map_reply};
pub use oracle::{CitationOracle, OracleReply};

/// Default address of a PMC article page; `{}` is replaced by the accession key.
pub const DEFAULT_ARTICLE_URL_FORMAT: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles/{}/";

/// PMC serves reduced pages to unknown clients, so a browser agent is sent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/60.0.3112.113 Safari/537.36";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("title landmark not found")]
    MissingTitle,
    #[error("no reference container with entries found")]
    MissingReferenceContainer,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("citation oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("malformed oracle reply: {0}")]
    MalformedReply(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ArticleError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
}

/// Runtime configuration shared by the library and the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub strategy: Strategy,
    /// Article URL template, `{}` is the accession key.
    pub article_url_format: String,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    /// FreeCite-compatible endpoint. Normalization is unavailable without it.
    pub oracle_url: Option<String>,
    pub oracle_timeout_secs: u64,
    pub max_concurrent_normalizations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            article_url_format: DEFAULT_ARTICLE_URL_FORMAT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: 30,
            oracle_url: None,
            oracle_timeout_secs: 10,
            max_concurrent_normalizations: 4,
        }
    }
}

impl Config {
    /// Build a normalizer backed by the configured FreeCite endpoint.
    pub fn normalizer(&self) -> Option<CitationNormalizer> {
        let url = self.oracle_url.as_ref()?;
        let oracle: Arc<dyn CitationOracle> = Arc::new(oracle::freecite::FreeCite::new(url));
        Some(
            CitationNormalizer::new(oracle)
                .with_timeout(Duration::from_secs(self.oracle_timeout_secs))
                .with_max_concurrent(self.max_concurrent_normalizations),
        )
    }
}
