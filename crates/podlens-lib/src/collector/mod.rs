//! Metrics collection from the cluster metrics API
//!
//! A poll lists pod metrics cluster-wide and reduces them to one
//! [`MetricRecord`] per container. The listing itself sits behind the
//! [`MetricsSource`] trait so the reduction can be exercised without a cluster.

mod kube_source;

pub use kube_source::KubeMetricsSource;

use crate::error::Result;
use crate::models::{MetricRecord, RecordKey};
use crate::quantity::canonicalize;
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub use async_trait::async_trait;

/// How cluster credentials are obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterAccess {
    /// Local kubeconfig with a named context (running outside the cluster)
    Kubeconfig { context: String },
    /// Service account mounted into the pod
    InCluster,
}

/// Usage of a single container as reported by the metrics API
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

/// Metrics snapshot of one pod
#[derive(Debug, Clone)]
pub struct PodMetrics {
    pub namespace: String,
    pub name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub containers: Vec<ContainerUsage>,
}

/// Trait for listing pod metrics snapshots
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// List metrics for every pod in the cluster
    async fn list_pod_metrics(&self) -> Result<Vec<PodMetrics>>;
}

/// Reduce pod snapshots to one record per container
///
/// Records are keyed by namespace, pod, and container. A later snapshot of
/// the same key in one listing replaces the earlier one.
pub fn reduce(pods: &[PodMetrics]) -> Vec<MetricRecord> {
    let mut records: BTreeMap<RecordKey, MetricRecord> = BTreeMap::new();

    for pod in pods {
        for container in &pod.containers {
            let record = MetricRecord {
                namespace: pod.namespace.clone(),
                name: pod.name.clone(),
                container: container.name.clone(),
                cpu_usage: usage_of(container, "cpu"),
                mem_usage: usage_of(container, "memory"),
                observed_at: pod.timestamp,
            };

            if records.insert(record.key(), record).is_some() {
                debug!(
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    container = %container.name,
                    "Duplicate container in metrics listing, keeping latest"
                );
            }
        }
    }

    records.into_values().collect()
}

fn usage_of(container: &ContainerUsage, resource: &str) -> String {
    container
        .usage
        .get(resource)
        .map(|q| canonicalize(&q.0))
        .unwrap_or_else(|| "0".to_string())
}

/// Polls a metrics source and produces records
#[derive(Clone)]
pub struct MetricCollector {
    source: Arc<dyn MetricsSource>,
}

impl MetricCollector {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self { source }
    }

    /// List all pod metrics and reduce them to records
    pub async fn poll(&self) -> Result<Vec<MetricRecord>> {
        let pods = self.source.list_pod_metrics().await?;
        let records = reduce(&pods);

        info!(
            pods = pods.len(),
            records = records.len(),
            "Polled cluster metrics"
        );

        Ok(records)
    }
}
