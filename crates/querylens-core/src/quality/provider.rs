//! The external answering function quality tests run against

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::QueryResponse;

/// Answers a legal query. Implemented by the retrieval/LLM subsystem.
#[async_trait::async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Answer `query`
    async fn answer(&self, query: &str) -> anyhow::Result<QueryResponse>;
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    query: &'a str,
}

/// Provider that POSTs `{"query": ...}` to an HTTP endpoint and expects a
/// [`QueryResponse`] JSON body.
///
/// A quality test that times out drops the in-flight request future. The
/// server may keep working on the query after that.
pub struct HttpAnswerProvider {
    client: Client,
    endpoint: String,
}

impl HttpAnswerProvider {
    /// Create a provider with a transport-level timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::config(format!("invalid answer endpoint: {endpoint}")));
        }
        Ok(Self { client, endpoint })
    }

    /// Target URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl AnswerProvider for HttpAnswerProvider {
    async fn answer(&self, query: &str) -> anyhow::Result<QueryResponse> {
        debug!(endpoint = %self.endpoint, "Requesting answer");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnswerRequest { query })
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<QueryResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_endpoint() {
        let result = HttpAnswerProvider::new("ftp://example.com", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_accepts_http_endpoint() {
        let provider =
            HttpAnswerProvider::new("http://localhost:8080/answer", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/answer");
    }
}
