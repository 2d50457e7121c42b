//! Batch object creation and deletion payloads

use crate::models::{DeleteReport, EmbeddedRecord, POD_CLASS};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequest {
    pub objects: Vec<BatchObject>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchObject {
    pub class: &'static str,
    pub properties: Map<String, Value>,
    pub vector: Vec<f32>,
}

impl From<&EmbeddedRecord> for BatchObject {
    fn from(embedded: &EmbeddedRecord) -> Self {
        let record = &embedded.record;
        let mut properties = Map::new();
        properties.insert("namespace".into(), json!(record.namespace));
        properties.insert("name".into(), json!(record.name));
        properties.insert("container".into(), json!(record.container));
        properties.insert("cpu".into(), json!(record.cpu_usage));
        properties.insert("mem".into(), json!(record.mem_usage));
        if let Some(observed_at) = record.observed_at {
            properties.insert(
                "observedAt".into(),
                json!(observed_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }

        Self {
            class: POD_CLASS,
            properties,
            vector: embedded.embedding.clone(),
        }
    }
}

/// Per-object outcome in a batch response
#[derive(Debug, Deserialize)]
pub(crate) struct BatchObjectResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub result: Option<BatchResult>,
}

impl BatchObjectResponse {
    fn errors(&self) -> Option<&ErrorList> {
        self.result
            .as_ref()
            .and_then(|r| r.errors.as_ref())
            .filter(|list| !list.error.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResult {
    #[serde(default)]
    pub errors: Option<ErrorList>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorList {
    #[serde(default)]
    pub error: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessage {
    pub message: String,
}

/// Number of objects in the response that carry at least one error
pub(crate) fn rejected_count(responses: &[BatchObjectResponse]) -> usize {
    responses.iter().filter(|r| r.errors().is_some()).count()
}

/// Collect the messages of every rejected object
///
/// Responses are positional, so each message is prefixed with the identity
/// of the record at the same index.
pub(crate) fn rejected_messages(
    records: &[EmbeddedRecord],
    responses: &[BatchObjectResponse],
) -> Vec<String> {
    let mut messages = Vec::new();

    for (index, response) in responses.iter().enumerate() {
        let errors = match response.errors() {
            Some(errors) => errors,
            None => continue,
        };

        let label = records
            .get(index)
            .map(|e| {
                format!(
                    "{}/{}/{}",
                    e.record.namespace, e.record.name, e.record.container
                )
            })
            .or_else(|| response.id.clone())
            .unwrap_or_else(|| format!("object #{}", index));

        for error in &errors.error {
            messages.push(format!("{}: {}", label, error.message));
        }
    }

    messages
}

/// Body of `DELETE /v1/batch/objects` removing objects created before `cutoff`
pub(crate) fn delete_before(cutoff: DateTime<Utc>) -> Value {
    json!({
        "match": {
            "class": POD_CLASS,
            "where": {
                "path": ["_creationTimeUnix"],
                "operator": "LessThan",
                "valueDate": cutoff.to_rfc3339_opts(SecondsFormat::Millis, true),
            }
        },
        "output": "verbose",
        "dryRun": false,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteResponse {
    pub results: DeleteResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteResults {
    #[serde(default)]
    pub matches: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
    /// Null when nothing matched
    #[serde(default)]
    pub objects: Option<Vec<DeletedObject>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeletedObject {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

impl From<DeleteResponse> for DeleteReport {
    fn from(response: DeleteResponse) -> Self {
        let results = response.results;
        DeleteReport {
            matched: results.matches,
            deleted: results.successful,
            failed: results.failed,
            ids: results
                .objects
                .unwrap_or_default()
                .into_iter()
                .filter(|o| o.status == "SUCCESS")
                .map(|o| o.id)
                .collect(),
        }
    }
}
