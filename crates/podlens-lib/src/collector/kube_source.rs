//! Pod metrics from the `metrics.k8s.io` API

use super::{async_trait, ClusterAccess, ContainerUsage, MetricsSource, PodMetrics};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use kube::api::{Api, ListParams};
use kube::config::KubeConfigOptions;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Client, Config};
use serde::Deserialize;
use tracing::debug;

const METRICS_GROUP: &str = "metrics.k8s.io";
const METRICS_VERSION: &str = "v1beta1";

/// Lists pod metrics through the Kubernetes API server
///
/// Credentials are resolved on every listing, so a rotated token or a
/// restored kubeconfig is picked up on the next cycle.
pub struct KubeMetricsSource {
    access: ClusterAccess,
}

/// Fields of a PodMetrics object besides its metadata
#[derive(Debug, Deserialize)]
struct PodMetricsBody {
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    containers: Vec<ContainerUsage>,
}

impl KubeMetricsSource {
    pub fn new(access: ClusterAccess) -> Self {
        Self { access }
    }

    async fn client(&self) -> Result<Client> {
        let config = match &self.access {
            ClusterAccess::Kubeconfig { context } => {
                debug!(context = %context, "Loading kubeconfig");
                let options = KubeConfigOptions {
                    context: Some(context.clone()),
                    ..Default::default()
                };
                Config::from_kubeconfig(&options)
                    .await
                    .map_err(|e| Error::Auth(format!("kubeconfig context '{}': {}", context, e)))?
            }
            ClusterAccess::InCluster => {
                Config::incluster().map_err(|e| Error::Auth(format!("in-cluster config: {}", e)))?
            }
        };

        Client::try_from(config).map_err(|e| Error::Auth(e.to_string()))
    }

    fn api_resource() -> ApiResource {
        let gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, "PodMetrics");
        ApiResource::from_gvk_with_plural(&gvk, "pods")
    }
}

#[async_trait]
impl MetricsSource for KubeMetricsSource {
    async fn list_pod_metrics(&self) -> Result<Vec<PodMetrics>> {
        let client = self.client().await?;
        let api: Api<DynamicObject> = Api::all_with(client, &Self::api_resource());

        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        list.items.into_iter().map(pod_metrics_from).collect()
    }
}

fn pod_metrics_from(object: DynamicObject) -> Result<PodMetrics> {
    let body: PodMetricsBody =
        serde_json::from_value(object.data).map_err(|e| Error::decode("pod metrics", e))?;

    Ok(PodMetrics {
        namespace: object.metadata.namespace.unwrap_or_default(),
        name: object.metadata.name.unwrap_or_default(),
        timestamp: body.timestamp,
        containers: body.containers,
    })
}
