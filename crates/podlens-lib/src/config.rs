//! Process configuration
//!
//! All settings are read once at startup from `PODLENS_*` environment
//! variables and passed explicitly to each component. Required values are
//! checked by the accessors of the component that needs them, so a query
//! server never fails for want of an embedding model.

use crate::collector::ClusterAccess;
use crate::embedding::ProviderKind;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable prefix for every setting
pub const ENV_PREFIX: &str = "PODLENS";

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";
const OLLAMA_URL_EXTERNAL: &str = "http://localhost:11434";
const OLLAMA_URL_IN_CLUSTER: &str = "http://host.docker.internal:11434";

/// Immutable process settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Vector store address as `host:port`
    #[serde(default)]
    pub weaviate_host: Option<String>,

    #[serde(default = "default_scheme")]
    pub weaviate_scheme: String,

    /// Optional bearer key sent to the vector store
    #[serde(default)]
    pub weaviate_api_key: Option<String>,

    #[serde(default)]
    pub embedding_model: Option<String>,

    /// Generation model bound into the class module config
    #[serde(default)]
    pub generative_model: Option<String>,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Use the local provider and local generative module
    #[serde(default)]
    pub dev: bool,

    /// Running outside the cluster
    #[serde(default)]
    pub ext: bool,

    /// Kube context used when running outside the cluster
    #[serde(default)]
    pub cluster_context: Option<String>,

    #[serde(default)]
    pub ollama_url: Option<String>,

    #[serde(default)]
    pub openai_url: Option<String>,

    #[serde(default = "default_interval")]
    pub scrape_interval_secs: u64,

    #[serde(default = "default_interval")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_interval() -> u64 {
    300
}

fn default_retention() -> u64 {
    3600
}

fn default_listen_port() -> u16 {
    8080
}

/// Treats empty values and a literal `""` as unset
fn present<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "\"\"")
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    present(value).ok_or_else(|| {
        Error::Config(format!(
            "please specify a value for '{}_{}'",
            ENV_PREFIX,
            key.to_uppercase()
        ))
    })
}

impl Settings {
    /// Load settings from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings from an explicit environment source
    pub fn from_environment(env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| Error::Config(e.to_string()))?;

        if settings.weaviate_scheme != "http" && settings.weaviate_scheme != "https" {
            return Err(Error::Config(format!(
                "unsupported weaviate scheme '{}'",
                settings.weaviate_scheme
            )));
        }

        Ok(settings)
    }

    pub fn weaviate_host(&self) -> Result<&str> {
        required(&self.weaviate_host, "weaviate_host")
    }

    /// Base URL of the vector store, e.g. `http://weaviate:8080`
    pub fn weaviate_url(&self) -> Result<String> {
        let raw = format!("{}://{}", self.weaviate_scheme, self.weaviate_host()?);
        let url = url::Url::parse(&raw)
            .map_err(|e| Error::Config(format!("invalid weaviate address '{}': {}", raw, e)))?;
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    pub fn weaviate_api_key(&self) -> Option<&str> {
        present(&self.weaviate_api_key)
    }

    pub fn embedding_model(&self) -> Result<&str> {
        required(&self.embedding_model, "embedding_model")
    }

    pub fn generative_model(&self) -> Result<&str> {
        required(&self.generative_model, "generative_model")
    }

    pub fn openai_api_key(&self) -> Result<&str> {
        required(&self.openai_api_key, "openai_api_key")
    }

    /// Which embedding backend the process uses
    pub fn provider_kind(&self) -> ProviderKind {
        if self.dev {
            ProviderKind::Local
        } else {
            ProviderKind::Hosted
        }
    }

    /// Local provider base URL, defaulting by where the process runs
    pub fn ollama_url(&self) -> String {
        match present(&self.ollama_url) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.ext => OLLAMA_URL_EXTERNAL.to_string(),
            None => OLLAMA_URL_IN_CLUSTER.to_string(),
        }
    }

    /// Endpoint the generative module of the store calls in dev mode
    pub fn generative_ollama_endpoint(&self) -> String {
        match present(&self.ollama_url) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => OLLAMA_URL_IN_CLUSTER.to_string(),
        }
    }

    pub fn openai_url(&self) -> String {
        present(&self.openai_url)
            .unwrap_or(DEFAULT_OPENAI_URL)
            .to_string()
    }

    /// How the collector obtains cluster credentials
    pub fn cluster_access(&self) -> Result<ClusterAccess> {
        if self.ext {
            let context = required(&self.cluster_context, "cluster_context")?;
            Ok(ClusterAccess::Kubeconfig {
                context: context.to_string(),
            })
        } else {
            Ok(ClusterAccess::InCluster)
        }
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
