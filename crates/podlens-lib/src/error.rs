//! Error taxonomy shared by every pipeline component

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required setting is missing, empty, or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// Cluster credentials could not be resolved
    #[error("cluster authentication failed: {0}")]
    Auth(String),

    /// The cluster metrics API call failed
    #[error("metrics upstream error: {0}")]
    Upstream(String),

    /// The embedding provider could not be reached or answered with a non-success status
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// A response body did not have the expected shape
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// Transport, auth, or status failure talking to the vector store
    #[error("vector store error: {0}")]
    Store(String),

    /// The readiness probe reported the store as not ready
    #[error("vector store is not ready: {0}")]
    StoreUnavailable(String),

    /// An existing class does not match the definition we tried to create
    #[error("class {class} already exists with a different definition: {detail}")]
    SchemaConflict { class: String, detail: String },

    /// The batch was accepted but some objects were rejected
    #[error(
        "batch ingestion rejected {rejected} of {submitted} object(s):\n{}",
        .messages.join("\n")
    )]
    IngestPartialFailure {
        submitted: usize,
        /// Distinct objects rejected; one object may carry several messages
        rejected: usize,
        messages: Vec<String>,
    },

    /// The store reported GraphQL errors, or the query transport failed
    #[error("query failed:\n{}", .0.join("\n"))]
    Query(Vec<String>),
}

impl Error {
    pub(crate) fn decode(what: &'static str, reason: impl ToString) -> Self {
        Error::Decode {
            what,
            reason: reason.to_string(),
        }
    }

    /// Messages of every rejected object, empty for other variants
    pub fn failed_messages(&self) -> &[String] {
        match self {
            Error::IngestPartialFailure { messages, .. } => messages,
            _ => &[],
        }
    }

    /// Objects the store accepted from a partially rejected batch
    pub fn accepted_objects(&self) -> Option<usize> {
        match self {
            Error::IngestPartialFailure {
                submitted, rejected, ..
            } => Some(submitted.saturating_sub(*rejected)),
            _ => None,
        }
    }
}
