//! Observability for the pipeline roles
//!
//! Provides:
//! - Prometheus metrics (cycle latency, ingestion and deletion counts, query latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Cycles talk to remote services, so buckets run from milliseconds to minutes
const CYCLE_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Generation dominates query latency
const QUERY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    scrape_cycle_seconds: Histogram,
    sweep_cycle_seconds: Histogram,
    query_latency_seconds: Histogram,
    records_collected: IntCounter,
    objects_ingested: IntCounter,
    objects_rejected: IntCounter,
    objects_deleted: IntCounter,
    cycle_errors: IntCounterVec,
    query_errors: IntCounter,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            scrape_cycle_seconds: register_histogram!(
                "podlens_scrape_cycle_seconds",
                "Time spent on one collect, embed and ingest cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_cycle_seconds"),

            sweep_cycle_seconds: register_histogram!(
                "podlens_sweep_cycle_seconds",
                "Time spent on one retention sweep",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register sweep_cycle_seconds"),

            query_latency_seconds: register_histogram!(
                "podlens_query_latency_seconds",
                "Time spent answering one natural-language query",
                QUERY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            records_collected: register_int_counter!(
                "podlens_records_collected_total",
                "Metric records produced from cluster listings"
            )
            .expect("Failed to register records_collected"),

            objects_ingested: register_int_counter!(
                "podlens_objects_ingested_total",
                "Objects accepted by the vector store"
            )
            .expect("Failed to register objects_ingested"),

            objects_rejected: register_int_counter!(
                "podlens_objects_rejected_total",
                "Objects rejected inside an accepted batch"
            )
            .expect("Failed to register objects_rejected"),

            objects_deleted: register_int_counter!(
                "podlens_objects_deleted_total",
                "Objects removed by retention sweeps"
            )
            .expect("Failed to register objects_deleted"),

            cycle_errors: register_int_counter_vec!(
                "podlens_cycle_errors_total",
                "Cycles that ended in an error, by role",
                &["role"]
            )
            .expect("Failed to register cycle_errors"),

            query_errors: register_int_counter!(
                "podlens_query_errors_total",
                "Queries that failed"
            )
            .expect("Failed to register query_errors"),
        }
    }
}

/// Handle to the process-wide pipeline metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_scrape_cycle(&self, duration_secs: f64) {
        self.inner().scrape_cycle_seconds.observe(duration_secs);
    }

    pub fn observe_sweep_cycle(&self, duration_secs: f64) {
        self.inner().sweep_cycle_seconds.observe(duration_secs);
    }

    pub fn observe_query_latency(&self, duration_secs: f64) {
        self.inner().query_latency_seconds.observe(duration_secs);
    }

    pub fn add_records_collected(&self, count: usize) {
        self.inner().records_collected.inc_by(count as u64);
    }

    pub fn add_objects_ingested(&self, count: usize) {
        self.inner().objects_ingested.inc_by(count as u64);
    }

    pub fn add_objects_rejected(&self, count: usize) {
        self.inner().objects_rejected.inc_by(count as u64);
    }

    pub fn add_objects_deleted(&self, count: u64) {
        self.inner().objects_deleted.inc_by(count);
    }

    pub fn inc_cycle_errors(&self, role: &str) {
        self.inner().cycle_errors.with_label_values(&[role]).inc();
    }

    pub fn inc_query_errors(&self) {
        self.inner().query_errors.inc();
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct StructuredLogger {
    role: String,
}

impl StructuredLogger {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn log_startup(&self, version: &str, period_secs: Option<u64>) {
        info!(
            event = "role_started",
            role = %self.role,
            version = %version,
            period_secs = ?period_secs,
            "Podlens role started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "role_shutdown",
            role = %self.role,
            reason = %reason,
            "Podlens role shutting down"
        );
    }

    /// Log a completed scrape cycle
    pub fn log_scrape_cycle(&self, collected: usize, ingested: usize, elapsed_secs: f64) {
        info!(
            event = "scrape_cycle",
            role = %self.role,
            collected = collected,
            ingested = ingested,
            elapsed_secs = elapsed_secs,
            "Scrape cycle completed"
        );
    }

    /// Log objects the store rejected from an accepted batch
    pub fn log_batch_failure(&self, submitted: usize, messages: &[String]) {
        warn!(
            event = "batch_rejected",
            role = %self.role,
            submitted = submitted,
            rejected = messages.len(),
            messages = ?messages,
            "Vector store rejected part of a batch"
        );
    }

    /// Log a completed retention sweep
    pub fn log_sweep(&self, cutoff: &str, matched: u64, deleted: u64, failed: u64) {
        if failed > 0 {
            warn!(
                event = "retention_sweep",
                role = %self.role,
                cutoff = %cutoff,
                matched = matched,
                deleted = deleted,
                failed = failed,
                "Retention sweep left objects behind"
            );
        } else {
            info!(
                event = "retention_sweep",
                role = %self.role,
                cutoff = %cutoff,
                matched = matched,
                deleted = deleted,
                "Retention sweep completed"
            );
        }
    }

    pub fn log_object_deleted(&self, id: &str) {
        info!(
            event = "object_deleted",
            role = %self.role,
            id = %id,
            "Deleted object"
        );
    }

    pub fn log_query(&self, answered: bool, elapsed_secs: f64) {
        info!(
            event = "query_answered",
            role = %self.role,
            answered = answered,
            elapsed_secs = elapsed_secs,
            "Query completed"
        );
    }

    /// Log a per-object generation failure reported alongside an answer
    pub fn log_generation_error(&self, message: &str) {
        warn!(
            event = "generation_error",
            role = %self.role,
            message = %message,
            "Store reported a generation error"
        );
    }

    pub fn log_cycle_error(&self, error: &str) {
        warn!(
            event = "cycle_failed",
            role = %self.role,
            error = %error,
            "Cycle failed"
        );
    }
}
