//! Embedding providers
//!
//! Two interchangeable backends sit behind [`EmbeddingProvider`]:
//! - [`LocalProvider`]: an Ollama-compatible inference service, no credentials
//! - [`HostedProvider`]: the OpenAI embeddings API, bearer credential
//!
//! The backend is chosen once at startup from [`Settings`].

mod hosted;
mod local;

pub use hosted::HostedProvider;
pub use local::LocalProvider;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{EmbeddedRecord, MetricRecord};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use async_trait::async_trait;

/// Statuses treated as a successful provider response
const ACCEPTED_STATUSES: [StatusCode; 3] =
    [StatusCode::OK, StatusCode::CREATED, StatusCode::ACCEPTED];

/// Which backend produces embeddings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Local,
    Hosted,
}

/// Trait for embedding generation backends
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into a single-precision vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn kind(&self) -> ProviderKind;
}

/// Build the provider selected by the settings
pub fn provider_from_settings(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let model = settings.embedding_model()?;
    let http = http_client()?;

    match settings.provider_kind() {
        ProviderKind::Local => Ok(Arc::new(LocalProvider::new(
            http,
            &settings.ollama_url(),
            model,
        ))),
        ProviderKind::Hosted => Ok(Arc::new(HostedProvider::new(
            http,
            settings.openai_url(),
            model,
            settings.openai_api_key()?,
        ))),
    }
}

/// Embed records one at a time, failing on the first error
pub async fn embed_records(
    provider: &dyn EmbeddingProvider,
    records: Vec<MetricRecord>,
) -> Result<Vec<EmbeddedRecord>> {
    let mut embedded = Vec::with_capacity(records.len());

    for record in records {
        let embedding = provider.embed(&record.embedding_input()).await?;
        debug!(
            namespace = %record.namespace,
            pod = %record.name,
            container = %record.container,
            dimensions = embedding.len(),
            "Embedded record"
        );
        embedded.push(EmbeddedRecord { record, embedding });
    }

    Ok(embedded)
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| Error::Provider(format!("failed to create HTTP client: {}", e)))
}

/// POST a JSON body and decode the JSON answer
///
/// Any status other than 200/201/202 fails with the response body verbatim.
async fn post_json<B, T>(
    http: &Client,
    url: &str,
    body: &B,
    bearer: Option<&str>,
    what: &'static str,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let mut request = http.post(url).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::Provider(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::Provider(format!("failed to read response from {}: {}", url, e)))?;

    if !ACCEPTED_STATUSES.contains(&status) {
        return Err(Error::Provider(format!(
            "received status code {}\n{}",
            status.as_u16(),
            text
        )));
    }

    serde_json::from_str(&text).map_err(|e| Error::decode(what, e))
}
