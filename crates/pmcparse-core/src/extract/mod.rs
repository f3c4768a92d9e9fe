//! Extraction strategies turning article markup into a [`Paper`].
//!
//! Two interchangeable implementations share the rules in
//! [`landmarks`](crate::landmarks):
//! - [`TreeExtractor`] queries a parsed `scraper` document;
//! - [`StreamExtractor`] runs a finite-state machine over a linear
//!   open/text/close event stream and never holds a document tree.

pub mod stream;
pub mod tokenize;
pub mod tree;

use serde::{Deserialize, Serialize};

use crate::ExtractionError;
use crate::model::Paper;

pub use stream::{MarkupEvent, StreamExtractor};
pub use tree::TreeExtractor;

/// A paper plus the non-fatal problems met while extracting it.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub paper: Paper,
    /// Degraded-but-usable conditions, e.g. no reference container.
    pub warnings: Vec<ExtractionError>,
}

/// Anything that can turn decoded page markup into a [`Paper`].
pub trait PaperExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Extract a paper from `markup`. `accession` becomes the paper's
    /// `repository_id`.
    fn extract_markup(
        &self,
        markup: &str,
        accession: &str,
    ) -> Result<ExtractionResult, ExtractionError>;
}

/// Which extractor to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Tree,
    Stream,
}

impl Strategy {
    pub fn extractor(self) -> &'static dyn PaperExtractor {
        match self {
            Strategy::Tree => &TreeExtractor,
            Strategy::Stream => &StreamExtractor,
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tree" => Ok(Strategy::Tree),
            "stream" | "streaming" => Ok(Strategy::Stream),
            other => Err(format!("unknown extraction strategy: {other}")),
        }
    }
}

impl PaperExtractor for Strategy {
    fn name(&self) -> &str {
        self.extractor().name()
    }

    fn extract_markup(
        &self,
        markup: &str,
        accession: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.extractor().extract_markup(markup, accession)
    }
}
