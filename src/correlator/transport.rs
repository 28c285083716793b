use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Recoverable correlator failures. After retries are exhausted they
/// degrade to a partial-result note for the affected coordinate; they never
/// abort the scan.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rate limited after {0} attempts")]
    RateLimited(u32),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed feed response: {0}")]
    Decode(String),
    #[error("scan deadline exceeded before the request was issued")]
    Deadline,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The HTTP primitive the correlator consumes. Connection pooling and TLS
/// belong to the implementation; tests inject stubs to count and script
/// responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FeedError>;
    async fn post_json(&self, url: &str, body: serde_json::Value)
        -> Result<HttpResponse, FeedError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("chainmap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FeedError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }

    async fn post_json(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<HttpResponse, FeedError> {
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}
