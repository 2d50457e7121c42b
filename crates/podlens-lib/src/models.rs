//! Core data models for the metrics pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class name of stored metric objects
pub const POD_CLASS: &str = "Pod";

/// Identity of one container within a poll cycle
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

/// One container's resource snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub namespace: String,
    /// Name of the owning pod
    pub name: String,
    pub container: String,
    /// Canonical quantity string, e.g. `120m`
    pub cpu_usage: String,
    /// Canonical quantity string, e.g. `256Mi`
    pub mem_usage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl MetricRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            namespace: self.namespace.clone(),
            pod: self.name.clone(),
            container: self.container.clone(),
        }
    }

    /// Text handed to the embedding provider
    pub fn embedding_input(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "namespace={} pod={} container={} cpu={} memory={}",
            self.namespace, self.name, self.container, self.cpu_usage, self.mem_usage
        )
    }
}

/// A record with its embedding attached
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedRecord {
    pub record: MetricRecord,
    pub embedding: Vec<f32>,
}

/// A metric object as read back from the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: String,
    /// Milliseconds since the epoch, assigned by the store
    pub creation_time_unix: i64,
    pub namespace: String,
    pub name: String,
    pub container: String,
    pub cpu: String,
    pub mem: String,
}

/// Outcome of a retention delete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    /// Objects the filter matched
    pub matched: u64,
    /// Objects actually removed
    pub deleted: u64,
    pub failed: u64,
    /// Ids of removed objects, when the store reports them
    pub ids: Vec<String>,
}
