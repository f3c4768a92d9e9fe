//! Citation oracle trait and implementations.
//!
//! An oracle turns one free-text citation into a JSON record of citation
//! fields. Oracles are remote and untrusted; their replies are only
//! interpreted by [`map_reply`](crate::normalize::map_reply).

pub mod freecite;
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::NormalizationError;

/// Unparsed oracle reply.
pub type OracleReply = serde_json::Value;

/// An external service that structures free-text citations.
pub trait CitationOracle: Send + Sync {
    /// The canonical name of this oracle (e.g., "FreeCite").
    fn name(&self) -> &str;

    /// Submit one citation string and return the raw reply.
    fn parse<'a>(
        &'a self,
        citation: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, NormalizationError>> + Send + 'a>>;
}
