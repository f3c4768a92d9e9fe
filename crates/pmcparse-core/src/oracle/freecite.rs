use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::ACCEPT;

use super::{CitationOracle, OracleReply};
use crate::NormalizationError;

/// A FreeCite-compatible HTTP endpoint (`POST citation=<text>`, JSON reply).
pub struct FreeCite {
    url: String,
}

impl FreeCite {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl CitationOracle for FreeCite {
    fn name(&self) -> &str {
        "FreeCite"
    }

    fn parse<'a>(
        &'a self,
        citation: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, NormalizationError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = client
                .post(&self.url)
                .form(&[("citation", citation)])
                .header(ACCEPT, "application/json")
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| NormalizationError::OracleUnavailable(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(NormalizationError::OracleUnavailable(format!(
                    "HTTP {}",
                    status
                )));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| NormalizationError::OracleUnavailable(e.to_string()))?;
            parse_body(&body)
        })
    }
}

fn parse_body(body: &str) -> Result<OracleReply, NormalizationError> {
    if body.trim().is_empty() {
        return Err(NormalizationError::MalformedReply("empty body".into()));
    }
    serde_json::from_str(body).map_err(|e| NormalizationError::MalformedReply(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(
            parse_body("  \n"),
            Err(NormalizationError::MalformedReply(_))
        ));
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(matches!(
            parse_body("<html>502 Bad Gateway</html>"),
            Err(NormalizationError::MalformedReply(_))
        ));
    }

    #[test]
    fn json_body_is_passed_through() {
        let reply = parse_body(r#"[{"title": "Some Study"}]"#).unwrap();
        assert_eq!(reply[0]["title"], "Some Study");
    }
}
