//! Podlens library: pod resource metrics as a queryable knowledge base
//!
//! This crate provides the core functionality for:
//! - Listing pod metrics from the cluster metrics API
//! - Embedding metric records with a local or hosted provider
//! - Ingesting and expiring objects in a Weaviate vector store
//! - Answering natural-language questions through grouped generation
//! - Health checks and observability

pub mod api;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod quantity;
pub mod query;
pub mod retention;
pub mod scheduler;
pub mod store;

pub use config::Settings;
pub use error::{Error, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
