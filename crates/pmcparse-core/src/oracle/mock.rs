//! Mock citation oracle for testing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{CitationOracle, OracleReply};
use crate::NormalizationError;

/// A configurable mock response for [`MockOracle`].
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Return this JSON reply.
    Reply(OracleReply),
    /// Simulate an unreachable oracle.
    Unavailable(String),
    /// Simulate a reply that cannot be decoded.
    Malformed(String),
}

/// A hand-rolled mock implementing [`CitationOracle`] for tests.
///
/// Replies are chosen in this order:
/// - a reply registered for the exact citation via [`respond_to`](MockOracle::respond_to);
/// - the next reply of the sequence given to [`with_sequence`](MockOracle::with_sequence);
/// - the fallback reply.
pub struct MockOracle {
    by_citation: HashMap<String, MockReply>,
    /// Popped from the back, so stored reversed.
    sequence: Mutex<Vec<MockReply>>,
    fallback: MockReply,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockOracle {
    /// Create a mock that always returns `reply`.
    pub fn new(reply: MockReply) -> Self {
        Self {
            by_citation: HashMap::new(),
            sequence: Mutex::new(Vec::new()),
            fallback: reply,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that returns replies in order, repeating the last one.
    pub fn with_sequence(mut replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "sequence must have at least one reply");
        let fallback = replies[replies.len() - 1].clone();
        replies.reverse();
        Self {
            sequence: Mutex::new(replies),
            ..Self::new(fallback)
        }
    }

    /// Answer `citation` with `reply`, regardless of call order.
    pub fn respond_to(mut self, citation: &str, reply: MockReply) -> Self {
        self.by_citation.insert(citation.to_string(), reply);
        self
    }

    /// Set simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `parse()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_reply(&self, citation: &str) -> MockReply {
        if let Some(reply) = self.by_citation.get(citation) {
            return reply.clone();
        }
        let mut seq = self.sequence.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl CitationOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    fn parse<'a>(
        &'a self,
        citation: &'a str,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, NormalizationError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply(citation);
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match reply {
                MockReply::Reply(value) => Ok(value),
                MockReply::Unavailable(msg) => Err(NormalizationError::OracleUnavailable(msg)),
                MockReply::Malformed(msg) => Err(NormalizationError::MalformedReply(msg)),
            }
        })
    }
}
