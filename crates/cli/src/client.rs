//! Client for the podlens query endpoint

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Generation can take a while on local models
const REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid query service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to reach the query service: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-200 status; the body is passed through
    #[error("{body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    body: &'a str,
}

pub struct QueryClient {
    client: Client,
    base_url: Url,
}

impl QueryClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Send one question and return the answer text
    pub async fn ask(&self, question: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.base_url.clone())
            .json(&QueryRequest { body: question })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(ClientError::Status { status, body });
        }

        Ok(body)
    }
}
