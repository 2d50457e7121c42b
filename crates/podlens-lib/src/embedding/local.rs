//! Local inference service (Ollama `/api/embed`)

use super::{async_trait, post_json, EmbeddingProvider, ProviderKind};
use crate::error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// The service embeds a list of inputs and answers with one vector each
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct LocalProvider {
    http: Client,
    endpoint: String,
    model: String,
}

impl LocalProvider {
    /// `base_url` is the service root, e.g. `http://localhost:11434`
    pub fn new(http: Client, base_url: &str, model: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let response: EmbedResponse = post_json(
            &self.http,
            &self.endpoint,
            &request,
            None,
            "local embedding response",
        )
        .await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::decode("local embedding response", "no embeddings returned"))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }
}
