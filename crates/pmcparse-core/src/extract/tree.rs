//! Tree-query extraction over a parsed `scraper` document.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::{ExtractionResult, PaperExtractor};
use crate::ExtractionError;
use crate::landmarks::{self, EntryParts};
use crate::model::{Paper, PaperKind};

static TITLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&landmarks::TITLE.selector()).unwrap());
static AUTHOR_GROUP_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&landmarks::AUTHOR_GROUP.selector()).unwrap());
static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(landmarks::ANCHOR).unwrap());
static HEADING_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(landmarks::ABSTRACT_HEADING).unwrap());
static REF_CONTAINER_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&landmarks::REFERENCE_CONTAINER.selector()).unwrap());
static LIST_ENTRY_SEL: Lazy<Selector> = Lazy::new(|| {
    let sel = format!(
        "{} {} > {}",
        landmarks::REFERENCE_LIST.selector(),
        landmarks::REFERENCE_LIST_ITEM,
        landmarks::REFERENCE_ENTRY
    );
    Selector::parse(&sel).unwrap()
});
static GENERIC_ENTRY_SEL: Lazy<Selector> = Lazy::new(|| {
    let sel = format!(
        "{} > {}",
        landmarks::GENERIC_ENTRY_PARENT,
        landmarks::REFERENCE_ENTRY
    );
    Selector::parse(&sel).unwrap()
});
static JOURNAL_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&landmarks::REFERENCE_JOURNAL.selector()).unwrap());
static VOLUME_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&landmarks::REFERENCE_VOLUME.selector()).unwrap());

/// Locates landmarks by structural selectors in a full document tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeExtractor;

impl TreeExtractor {
    pub fn extract(
        &self,
        document: &Html,
        accession: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let title = document
            .select(&TITLE_SEL)
            .next()
            .map(|el| element_text(el).trim().to_string())
            .ok_or(ExtractionError::MissingTitle)?;

        let author_group = document.select(&AUTHOR_GROUP_SEL).next();
        let kind = if author_group.is_some() {
            PaperKind::RepositoryNative
        } else {
            PaperKind::Generic
        };

        let mut paper = Paper::new(kind);
        paper.title = title;
        paper.repository_id = Some(accession.to_string());

        if let Some(group) = author_group {
            paper.authors.extend(
                group
                    .select(&ANCHOR_SEL)
                    .map(|a| element_text(a).trim().to_string()),
            );
        } else {
            tracing::debug!(accession, "no author group, treating page as generic");
        }

        paper.abstract_text = find_abstract(document).unwrap_or_default();

        let mut warnings = Vec::new();
        let entries = reference_entries(document);
        if entries.is_empty() {
            tracing::debug!(accession, "no reference entries found");
            warnings.push(ExtractionError::MissingReferenceContainer);
        }
        paper
            .references
            .extend(entries.into_iter().map(|e| entry_parts(e).into_reference()));

        tracing::debug!(
            accession,
            authors = paper.authors.len(),
            references = paper.references.len(),
            "tree extraction complete"
        );

        Ok(ExtractionResult { paper, warnings })
    }
}

impl PaperExtractor for TreeExtractor {
    fn name(&self) -> &str {
        "tree"
    }

    fn extract_markup(
        &self,
        markup: &str,
        accession: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let document = Html::parse_document(markup);
        self.extract(&document, accession)
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// The first paragraph following the first "Abstract" heading, in document
/// order, before the next heading or landmark.
fn find_abstract(document: &Html) -> Option<String> {
    let heading = document
        .select(&HEADING_SEL)
        .find(|h| element_text(*h).trim() == landmarks::ABSTRACT_LABEL)?;

    let mut passed_heading = false;
    for node in document.tree.root().descendants() {
        if node.id() == heading.id() {
            passed_heading = true;
            continue;
        }
        if !passed_heading || node.ancestors().any(|a| a.id() == heading.id()) {
            continue;
        }
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let name = el.value().name();
        if name == landmarks::ABSTRACT_PARAGRAPH {
            return Some(element_text(el).trim().to_string());
        }
        if landmarks::ends_abstract_search(name, el.value().attr("class")) {
            return None;
        }
    }
    None
}

/// Entry spans of the first reference container. List-shaped entries win
/// when there is at least one; otherwise div-shaped entries are used.
fn reference_entries(document: &Html) -> Vec<ElementRef<'_>> {
    let Some(container) = document.select(&REF_CONTAINER_SEL).next() else {
        return Vec::new();
    };
    let listed: Vec<ElementRef<'_>> = container.select(&LIST_ENTRY_SEL).collect();
    if !listed.is_empty() {
        return listed;
    }
    container.select(&GENERIC_ENTRY_SEL).collect()
}

fn entry_parts(entry: ElementRef<'_>) -> EntryParts {
    EntryParts {
        text: element_text(entry),
        journal: entry
            .select(&JOURNAL_SEL)
            .next()
            .map(|el| element_text(el).trim().to_string()),
        volume: entry
            .select(&VOLUME_SEL)
            .next()
            .map(|el| element_text(el).trim().to_string()),
        anchors: entry
            .select(&ANCHOR_SEL)
            .map(|a| (element_text(a), a.value().attr("href").map(str::to_string)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Result<ExtractionResult, ExtractionError> {
        TreeExtractor.extract_markup(html, "PMC123")
    }

    #[test]
    fn test_title_is_extracted() {
        let html = r#"<html><body>
            <h1 class="content-title">Inhibition of X in Y</h1>
        </body></html>"#;
        let result = extract(html).unwrap();
        assert_eq!(result.paper.title, "Inhibition of X in Y");
        assert_eq!(result.paper.repository_id.as_deref(), Some("PMC123"));
        assert_eq!(result.paper.identifier, None);
    }

    #[test]
    fn test_missing_title_is_fatal() {
        let html = "<html><body><h1>Untagged heading</h1></body></html>";
        assert!(matches!(extract(html), Err(ExtractionError::MissingTitle)));
    }

    #[test]
    fn test_authors_in_document_order() {
        let html = r#"<html><body>
            <h1 class="content-title">T</h1>
            <div class="contrib-group fm-author">
                <a href="/a/1">Smith J</a>, <a href="/a/2">Doe A</a>, <a href="/a/3">Smith J</a>
            </div>
        </body></html>"#;
        let paper = extract(html).unwrap().paper;
        assert_eq!(paper.authors, vec!["Smith J", "Doe A", "Smith J"]);
        assert_eq!(paper.kind, PaperKind::RepositoryNative);
    }

    #[test]
    fn test_missing_author_group_is_generic() {
        let html = r#"<html><body><h1 class="content-title">T</h1></body></html>"#;
        let paper = extract(html).unwrap().paper;
        assert!(paper.authors.is_empty());
        assert_eq!(paper.kind, PaperKind::Generic);
    }

    #[test]
    fn test_abstract_follows_heading() {
        let html = r#"<html><body>
            <h1 class="content-title">T</h1>
            <div class="sec"><h2>Abstract</h2><div><p>We studied things.</p></div></div>
            <h2>Introduction</h2><p>Not the abstract.</p>
        </body></html>"#;
        assert_eq!(extract(html).unwrap().paper.abstract_text, "We studied things.");
    }

    #[test]
    fn test_no_abstract_heading_is_not_an_error() {
        let html = r#"<html><body>
            <h1 class="content-title">T</h1>
            <h2>Background</h2><p>Some text.</p>
        </body></html>"#;
        let result = extract(html).unwrap();
        assert_eq!(result.paper.abstract_text, "");
    }

    #[test]
    fn test_abstract_heading_without_paragraph() {
        let html = r#"<html><body>
            <h1 class="content-title">T</h1>
            <h2>Abstract</h2>
            <h2>Methods</h2><p>Methods text.</p>
        </body></html>"#;
        assert_eq!(extract(html).unwrap().paper.abstract_text, "");
    }

    #[test]
    fn test_list_shaped_references() {
        let html = r#"<html><body>
            <h1 class="content-title">T</h1>
            <div class="ref-list-sec sec"><ul class="back-ref-list">
                <li><span>Smith J. Some Study. J Med. 2001 [<a href="/pubmed/123">PubMed</a>]</span></li>
                <li><span>Doe A. Other. <span class="ref-journal">Cell</span> <span class="ref-vol">12</span></span></li>
            </ul></div>
        </body></html>"#;
        let result = extract(html).unwrap();
        assert!(result.warnings.is_empty());
        let refs = &result.paper.references;
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].raw_text, "Smith J. Some Study. J Med. 2001");
        assert_eq!(refs[0].external_link_pubmed.as_deref(), Some("/pubmed/123"));
        assert_eq!(refs[0].external_link_fulltext, None);
        assert_eq!(refs[1].journal.as_deref(), Some("Cell"));
        assert_eq!(refs[1].volume.as_deref(), Some("12"));
        assert_eq!(refs[1].external_link_pubmed, None);
    }

    #[test]
    fn test_div_shaped_fallback() {
        let html = r#"<html><body>
            <h1 class="content-title">T</h1>
            <div class="ref-list-sec sec">
                <ul class="back-ref-list"></ul>
                <div class="ref-cit-blk"><span>First ref [<a href="/pmc/articles/PMC9/">PMC free article</a>]</span></div>
                <div class="ref-cit-blk"><span>Second ref</span></div>
            </div>
        </body></html>"#;
        let refs = extract(html).unwrap().paper.references;
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].raw_text, "First ref");
        assert_eq!(
            refs[0].external_link_fulltext.as_deref(),
            Some("/pmc/articles/PMC9/")
        );
        assert_eq!(refs[1].raw_text, "Second ref");
    }

    #[test]
    fn test_missing_reference_container_is_a_warning() {
        let html = r#"<html><body><h1 class="content-title">T</h1></body></html>"#;
        let result = extract(html).unwrap();
        assert!(result.paper.references.is_empty());
        assert!(matches!(
            result.warnings.as_slice(),
            [ExtractionError::MissingReferenceContainer]
        ));
    }
}
