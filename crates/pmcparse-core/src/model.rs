//! Canonical in-memory records produced by the extractors.
//!
//! These types carry no behavior beyond construction helpers. Absence is
//! always `None`, so "not present in the page" stays distinguishable from
//! "present but blank".

use serde::{Deserialize, Serialize};

/// Whether the page exposed the repository's own structural landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperKind {
    /// The author-group landmark was present.
    RepositoryNative,
    /// The page was only understood through fallback paths.
    Generic,
}

/// A paper extracted from one article page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub kind: PaperKind,
    pub title: String,
    /// Author names in document order. Never deduplicated.
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// References in document order.
    pub references: Vec<Reference>,
    /// PubMed id. Supplied by the caller, never read from markup.
    pub identifier: Option<u64>,
    /// PMC accession key the page was requested with.
    pub repository_id: Option<String>,
}

impl Paper {
    pub fn new(kind: PaperKind) -> Self {
        Self {
            kind,
            title: String::new(),
            authors: Vec::new(),
            abstract_text: String::new(),
            references: Vec::new(),
            identifier: None,
            repository_id: None,
        }
    }
}

/// One entry of a paper's reference list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Visible entry text with trailing UI labels removed.
    pub raw_text: String,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub external_link_pubmed: Option<String>,
    pub external_link_fulltext: Option<String>,
    /// Structured fields from the citation oracle, replaced wholesale on
    /// every normalization pass.
    pub normalized: Option<NormalizedCitation>,
}

impl Reference {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Self::default()
        }
    }
}

/// A citation as structured by the oracle. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCitation {
    pub authors: Option<Vec<String>>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub journal: Option<String>,
    pub publisher: Option<String>,
    pub book_title: Option<String>,
    pub volume: Option<String>,
    pub note: Option<String>,
}
