//! Vector store gateway (Weaviate REST and GraphQL)
//!
//! Owns schema bootstrap, batch ingestion with per-object error
//! reconciliation, retention deletion, and raw GraphQL access for the
//! query service.

mod batch;
mod schema;

pub use schema::{pod_class, ClassDefinition, InvertedIndexConfig, Property};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{DeleteReport, EmbeddedRecord, StoredObject, POD_CLASS};
use batch::{BatchObject, BatchObjectResponse, BatchRequest, DeleteResponse};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on objects returned by a read-back query
const FETCH_LIMIT: usize = 10_000;

/// Client for one vector store instance
#[derive(Clone)]
pub struct WeaviateGateway {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl WeaviateGateway {
    /// `base_url` is the store root, e.g. `http://weaviate:8080`
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Store(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.weaviate_url()?,
            settings.weaviate_api_key().map(str::to_string),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| Error::Store(format!("{} failed: {}", action, e)))
    }

    async fn expect_success(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Store(format!(
            "{} returned status {}: {}",
            action,
            status.as_u16(),
            body
        )))
    }

    /// Whether the store answers its readiness probe
    pub async fn readiness_check(&self) -> Result<bool> {
        let response = self
            .send(self.request(Method::GET, "/v1/.well-known/ready"), "readiness probe")
            .await?;
        Ok(response.status().is_success())
    }

    /// Fail fast with `StoreUnavailable` unless the store is ready
    pub async fn ensure_ready(&self) -> Result<()> {
        match self.readiness_check().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::StoreUnavailable(format!(
                "{} reported not ready",
                self.base_url
            ))),
            Err(e) => Err(Error::StoreUnavailable(e.to_string())),
        }
    }

    /// Create the class, accepting an identical existing one
    ///
    /// An "already exists" answer is verified against the stored class so a
    /// different definition is reported rather than silently kept.
    pub async fn ensure_schema(&self, class: &ClassDefinition) -> Result<()> {
        let response = self
            .send(
                self.request(Method::POST, "/v1/schema").json(class),
                "class creation",
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(class = %class.class, "Created class schema");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::UNPROCESSABLE_ENTITY {
            return Err(Error::Store(format!(
                "class creation returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let existing = self.fetch_class(&class.class).await.map_err(|e| {
            Error::Store(format!("class creation rejected ({}); {}", body, e))
        })?;

        match class.difference_from(&existing) {
            None => {
                info!(class = %class.class, "Class schema already exists");
                Ok(())
            }
            Some(detail) => Err(Error::SchemaConflict {
                class: class.class.clone(),
                detail,
            }),
        }
    }

    async fn fetch_class(&self, name: &str) -> Result<ClassDefinition> {
        let path = format!("/v1/schema/{}", name);
        let response = self
            .send(self.request(Method::GET, &path), "class lookup")
            .await?;
        let response = Self::expect_success(response, "class lookup").await?;

        response
            .json()
            .await
            .map_err(|e| Error::decode("class definition", e))
    }

    /// Submit all records as one batch
    ///
    /// The batch is not atomic: accepted objects stay committed even when
    /// others are rejected, and every rejection message is reported.
    pub async fn ingest(&self, records: &[EmbeddedRecord]) -> Result<usize> {
        if records.is_empty() {
            debug!("Nothing to ingest");
            return Ok(0);
        }

        let request = BatchRequest {
            objects: records.iter().map(BatchObject::from).collect(),
        };

        let response = self
            .send(
                self.request(Method::POST, "/v1/batch/objects").json(&request),
                "batch ingestion",
            )
            .await?;
        let response = Self::expect_success(response, "batch ingestion").await?;

        let results: Vec<BatchObjectResponse> = response
            .json()
            .await
            .map_err(|e| Error::decode("batch response", e))?;

        let messages = batch::rejected_messages(records, &results);
        if !messages.is_empty() {
            let rejected = batch::rejected_count(&results);
            warn!(
                submitted = records.len(),
                rejected = rejected,
                "Batch ingestion partially failed"
            );
            return Err(Error::IngestPartialFailure {
                submitted: records.len(),
                rejected,
                messages,
            });
        }

        for result in &results {
            debug!(id = ?result.id, "Object stored");
        }
        info!(objects = results.len(), "Batch ingested");

        Ok(results.len())
    }

    /// Delete every object created strictly before `cutoff`
    ///
    /// The store caps how many objects one call removes; anything beyond
    /// the cap is left for the next sweep.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<DeleteReport> {
        let response = self
            .send(
                self.request(Method::DELETE, "/v1/batch/objects")
                    .json(&batch::delete_before(cutoff)),
                "batch deletion",
            )
            .await?;
        let response = Self::expect_success(response, "batch deletion").await?;

        let parsed: DeleteResponse = response
            .json()
            .await
            .map_err(|e| Error::decode("batch deletion response", e))?;

        Ok(parsed.into())
    }

    /// Run a GraphQL document and return its `data` tree
    ///
    /// GraphQL-level errors and transport failures both surface as
    /// `Error::Query` carrying every message.
    pub async fn graphql(&self, query: &str) -> Result<Value> {
        let response = self
            .request(Method::POST, "/v1/graphql")
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| Error::Query(vec![format!("GraphQL request failed: {}", e)]))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Query(vec![format!(
                "GraphQL endpoint returned status {}: {}",
                status.as_u16(),
                body
            )]));
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| Error::Query(vec![format!("invalid GraphQL response: {}", e)]))?;

        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            return Err(Error::Query(errors.into_iter().map(|e| e.message).collect()));
        }

        Ok(json!({ "data": parsed.data.unwrap_or(Value::Null) }))
    }

    /// Read back stored metric objects
    pub async fn fetch_objects(&self) -> Result<Vec<StoredObject>> {
        let query = format!(
            "{{ Get {{ {}(limit: {}) {{ namespace name container cpu mem _additional {{ id creationTimeUnix }} }} }} }}",
            POD_CLASS, FETCH_LIMIT
        );
        let response = self.graphql(&query).await?;

        let items = response
            .pointer(&format!("/data/Get/{}", POD_CLASS))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        items.iter().map(stored_object_from).collect()
    }
}

fn stored_object_from(item: &Value) -> Result<StoredObject> {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let additional = item
        .get("_additional")
        .ok_or_else(|| Error::decode("stored object", "missing _additional"))?;
    let id = additional
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decode("stored object", "missing id"))?
        .to_string();
    let creation_time_unix = match additional.get("creationTimeUnix") {
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map_err(|e| Error::decode("stored object", e))?,
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| Error::decode("stored object", "creationTimeUnix out of range"))?,
        _ => return Err(Error::decode("stored object", "missing creationTimeUnix")),
    };

    Ok(StoredObject {
        id,
        creation_time_unix,
        namespace: text("namespace"),
        name: text("name"),
        container: text("container"),
        cpu: text("cpu"),
        mem: text("mem"),
    })
}
