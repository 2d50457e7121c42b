//! Hosted embeddings API (OpenAI `/v1/embeddings`)

use super::{async_trait, post_json, EmbeddingProvider, ProviderKind};
use crate::error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Entries carry double-precision values
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

pub struct HostedProvider {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HostedProvider {
    pub fn new(
        http: Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

/// Narrow to single precision, preserving order and length
fn narrow(values: Vec<f64>) -> Vec<f32> {
    values.into_iter().map(|v| v as f32).collect()
}

#[async_trait]
impl EmbeddingProvider for HostedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response: EmbeddingResponse = post_json(
            &self.http,
            &self.endpoint,
            &request,
            Some(&self.api_key),
            "hosted embedding response",
        )
        .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|entry| narrow(entry.embedding))
            .ok_or_else(|| Error::decode("hosted embedding response", "no embedding entry returned"))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Hosted
    }
}
