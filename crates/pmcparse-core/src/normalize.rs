//! Citation normalization through an external oracle.
//!
//! [`map_reply`] interprets an oracle reply and never touches the network.
//! [`CitationNormalizer`] adds the per-call timeout and the bounded per-paper
//! fan-out.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde_json::{Map, Value};

use crate::NormalizationError;
use crate::model::{NormalizedCitation, Paper};
use crate::oracle::{CitationOracle, OracleReply};

const AUTHORS: &[&str] = &["authors", "author"];
const TITLE: &[&str] = &["title"];
const YEAR: &[&str] = &["year", "date"];
const JOURNAL: &[&str] = &["journal", "container-title"];
const PUBLISHER: &[&str] = &["publisher"];
const BOOK_TITLE: &[&str] = &["book_title", "booktitle"];
const VOLUME: &[&str] = &["volume"];
const NOTE: &[&str] = &["note"];

/// Map an oracle reply onto a [`NormalizedCitation`].
///
/// Accepts a record object, or an array whose first element is one. Fields
/// the reply omits (or sends as `null`) stay `None`.
pub fn map_reply(reply: &OracleReply) -> Result<NormalizedCitation, NormalizationError> {
    let record = match reply {
        Value::Object(map) => map,
        Value::Array(items) => match items.first() {
            Some(Value::Object(map)) => map,
            Some(_) => return Err(malformed("first reply element is not an object")),
            None => return Err(malformed("reply holds no records")),
        },
        _ => return Err(malformed("reply is not an object")),
    };

    Ok(NormalizedCitation {
        authors: authors_field(record)?,
        title: scalar_field(record, TITLE)?,
        year: scalar_field(record, YEAR)?,
        journal: scalar_field(record, JOURNAL)?,
        publisher: scalar_field(record, PUBLISHER)?,
        book_title: scalar_field(record, BOOK_TITLE)?,
        volume: scalar_field(record, VOLUME)?,
        note: scalar_field(record, NOTE)?,
    })
}

fn malformed(msg: impl Into<String>) -> NormalizationError {
    NormalizationError::MalformedReply(msg.into())
}

/// First non-null field among `names`, with the name it was found under.
fn lookup<'a>(record: &'a Map<String, Value>, names: &[&'a str]) -> Option<(&'a str, &'a Value)> {
    names
        .iter()
        .find_map(|name| match record.get(*name) {
            None | Some(Value::Null) => None,
            Some(value) => Some((*name, value)),
        })
}

fn scalar_field(
    record: &Map<String, Value>,
    names: &[&str],
) -> Result<Option<String>, NormalizationError> {
    let Some((name, value)) = lookup(record, names) else {
        return Ok(None);
    };
    scalar(value).ok_or_else(|| malformed(format!("field `{name}` is not a scalar")))
}

/// `None` inside the `Some` means an empty array, which counts as absent.
fn scalar(value: &Value) -> Option<Option<String>> {
    match value {
        Value::Null => Some(None),
        Value::String(s) => Some(Some(s.clone())),
        Value::Number(n) => Some(Some(n.to_string())),
        Value::Array(items) => match items.first() {
            Some(first) => scalar(first),
            None => Some(None),
        },
        _ => None,
    }
}

fn authors_field(record: &Map<String, Value>) -> Result<Option<Vec<String>>, NormalizationError> {
    let Some((name, value)) = lookup(record, AUTHORS) else {
        return Ok(None);
    };
    match value {
        Value::String(s) => Ok(Some(vec![s.clone()])),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                author_name(item)
                    .ok_or_else(|| malformed(format!("field `{name}` holds a non-name entry")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        _ => Err(malformed(format!("field `{name}` is not a list of names"))),
    }
}

/// A plain string, or a `{given, family}` / `{literal}` name object.
fn author_name(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(parts) => {
            if let Some(literal) = parts.get("literal").and_then(Value::as_str) {
                return Some(literal.to_string());
            }
            let given = parts.get("given").and_then(Value::as_str);
            let family = parts.get("family").and_then(Value::as_str);
            match (given, family) {
                (Some(g), Some(f)) => Some(format!("{} {}", g.trim(), f.trim())),
                (None, Some(f)) => Some(f.trim().to_string()),
                (Some(g), None) => Some(g.trim().to_string()),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

/// One reference that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFailure {
    /// Position in `Paper::references`.
    pub index: usize,
    pub error: NormalizationError,
}

/// Outcome of normalizing every reference of one paper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub normalized: usize,
    /// Sorted by index.
    pub failures: Vec<ReferenceFailure>,
}

impl NormalizationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sends citations to an oracle and maps the replies.
pub struct CitationNormalizer {
    oracle: Arc<dyn CitationOracle>,
    client: reqwest::Client,
    timeout: Duration,
    max_concurrent: usize,
}

impl CitationNormalizer {
    pub fn new(oracle: Arc<dyn CitationOracle>) -> Self {
        Self {
            oracle,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
            max_concurrent: 4,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Upper bound for one oracle call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Oracle calls in flight per paper. Zero is treated as one.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Normalize one citation string. No retries.
    pub async fn normalize(&self, raw_text: &str) -> Result<NormalizedCitation, NormalizationError> {
        let call = self.oracle.parse(raw_text, &self.client, self.timeout);
        let reply = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(NormalizationError::OracleUnavailable(format!(
                    "no reply within {:.1}s",
                    self.timeout.as_secs_f64()
                )));
            }
        };
        map_reply(&reply)
    }

    /// Normalize every reference of `paper` in place.
    ///
    /// Successes replace `Reference::normalized` wholesale. A failed reference
    /// keeps whatever it had and is listed in the report.
    pub async fn normalize_paper(&self, paper: &mut Paper) -> NormalizationReport {
        let jobs = paper.references.iter().enumerate().map(|(index, reference)| {
            let raw_text = reference.raw_text.clone();
            async move { (index, self.normalize(&raw_text).await) }
        });
        let results: Vec<_> = stream::iter(jobs)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = NormalizationReport::default();
        for (index, result) in results {
            match result {
                Ok(citation) => {
                    tracing::debug!(index, oracle = self.oracle.name(), "reference normalized");
                    paper.references[index].normalized = Some(citation);
                    report.normalized += 1;
                }
                Err(error) => {
                    tracing::warn!(index, error = %error, "reference normalization failed");
                    report.failures.push(ReferenceFailure { index, error });
                }
            }
        }
        report.failures.sort_by_key(|f| f.index);
        report
    }
}
