//! Fetch, extract and optionally normalize one article.

use crate::extract::{ExtractionResult, PaperExtractor};
use crate::fetch::PageSource;
use crate::model::Paper;
use crate::normalize::{CitationNormalizer, NormalizationReport};
use crate::{ArticleError, ExtractionError};

/// Everything learned about one article.
#[derive(Debug, Clone)]
pub struct ArticleOutcome {
    pub paper: Paper,
    pub warnings: Vec<ExtractionError>,
    /// `None` when normalization was not requested.
    pub normalization: Option<NormalizationReport>,
}

/// Run the whole pipeline for `accession`.
///
/// `identifier` is the PubMed id, which pages do not carry reliably.
pub async fn parse_article(
    source: &dyn PageSource,
    accession: &str,
    identifier: Option<u64>,
    extractor: &dyn PaperExtractor,
    normalizer: Option<&CitationNormalizer>,
) -> Result<ArticleOutcome, ArticleError> {
    let markup = source.fetch(accession).await?;
    tracing::debug!(
        accession,
        source = source.name(),
        extractor = extractor.name(),
        bytes = markup.len(),
        "page fetched"
    );

    let ExtractionResult {
        mut paper,
        warnings,
    } = extractor.extract_markup(&markup, accession)?;
    paper.identifier = identifier;
    for warning in &warnings {
        tracing::warn!(accession, warning = %warning, "degraded extraction");
    }

    let normalization = match normalizer {
        Some(normalizer) => Some(normalizer.normalize_paper(&mut paper).await),
        None => None,
    };

    Ok(ArticleOutcome {
        paper,
        warnings,
        normalization,
    })
}
