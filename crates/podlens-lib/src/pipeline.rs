//! The scrape cycle: collect, embed, and ingest one snapshot

use crate::collector::MetricCollector;
use crate::embedding::{embed_records, EmbeddingProvider};
use crate::error::Result;
use crate::health::{Component, HealthRegistry};
use crate::models::EmbeddedRecord;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::scheduler::Cycle;
use crate::store::{ClassDefinition, WeaviateGateway};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one successful scrape cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub collected: usize,
    pub ingested: usize,
}

pub struct ScrapeCycle {
    collector: MetricCollector,
    provider: Arc<dyn EmbeddingProvider>,
    gateway: WeaviateGateway,
    class: ClassDefinition,
    health: HealthRegistry,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl ScrapeCycle {
    pub fn new(
        collector: MetricCollector,
        provider: Arc<dyn EmbeddingProvider>,
        gateway: WeaviateGateway,
        class: ClassDefinition,
        health: HealthRegistry,
    ) -> Self {
        Self {
            collector,
            provider,
            gateway,
            class,
            health,
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("scrape"),
        }
    }

    /// Run the cycle once
    ///
    /// Every record is embedded before the store is touched, so an
    /// embedding failure leaves the store unchanged.
    pub async fn run(&self) -> Result<CycleReport> {
        let started = Instant::now();

        let records = self.stage(Component::Collector, self.collector.poll()).await?;
        let collected = records.len();
        self.metrics.add_records_collected(collected);

        let embedded = self
            .stage(
                Component::Embedder,
                embed_records(self.provider.as_ref(), records),
            )
            .await?;

        let ingested = self
            .stage(Component::Store, self.store(&embedded))
            .await?;

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_scrape_cycle(elapsed);
        self.logger.log_scrape_cycle(collected, ingested, elapsed);

        Ok(CycleReport { collected, ingested })
    }

    async fn store(&self, embedded: &[EmbeddedRecord]) -> Result<usize> {
        self.gateway.ensure_ready().await?;
        self.gateway.ensure_schema(&self.class).await?;

        match self.gateway.ingest(embedded).await {
            Ok(ingested) => {
                self.metrics.add_objects_ingested(ingested);
                Ok(ingested)
            }
            Err(e) => {
                // Only a partially rejected batch left anything committed
                if let Some(accepted) = e.accepted_objects() {
                    self.logger
                        .log_batch_failure(embedded.len(), e.failed_messages());
                    self.metrics.add_objects_ingested(accepted);
                    self.metrics
                        .add_objects_rejected(embedded.len().saturating_sub(accepted));
                }
                Err(e)
            }
        }
    }

    /// Await one stage and record its outcome on `component`
    async fn stage<T, F>(&self, component: Component, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = work.await;
        self.health.record(component, &outcome).await;
        outcome
    }
}

#[async_trait]
impl Cycle for ScrapeCycle {
    async fn run_once(&self) -> Result<()> {
        match self.run().await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.metrics.inc_cycle_errors(self.logger.role());
                self.logger.log_cycle_error(&e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{ContainerUsage, MetricsSource, PodMetrics};
    use crate::embedding::ProviderKind;
    use crate::error::Error;
    use crate::query::QueryService;
    use crate::store::{InvertedIndexConfig, Property};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use mockito::Matcher;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource(Vec<PodMetrics>);

    #[async_trait]
    impl MetricsSource for StaticSource {
        async fn list_pod_metrics(&self) -> Result<Vec<PodMetrics>> {
            Ok(self.0.clone())
        }
    }

    /// Returns a fixed 4-dimension vector, failing after `fail_after` calls
    struct StubProvider {
        calls: AtomicUsize,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.map_or(false, |limit| call >= limit) {
                return Err(Error::Provider("received status code 500\n".to_string()));
            }
            Ok(vec![0.25, 0.5, 0.75, 1.0])
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Local
        }
    }

    fn pod(name: &str, cpu: &str, memory: &str) -> PodMetrics {
        let mut usage = BTreeMap::new();
        usage.insert("cpu".to_string(), Quantity(cpu.to_string()));
        usage.insert("memory".to_string(), Quantity(memory.to_string()));
        PodMetrics {
            namespace: "default".to_string(),
            name: name.to_string(),
            timestamp: None,
            containers: vec![ContainerUsage {
                name: name.to_string(),
                usage,
            }],
        }
    }

    fn class() -> ClassDefinition {
        ClassDefinition {
            class: "Pod".to_string(),
            vectorizer: "none".to_string(),
            module_config: None,
            inverted_index_config: Some(InvertedIndexConfig {
                index_timestamps: true,
            }),
            properties: vec![Property::new("name", "text")],
        }
    }

    fn scrape_cycle(url: String, fail_after: Option<usize>) -> (ScrapeCycle, Arc<StubProvider>) {
        let provider = Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
            fail_after,
        });
        let source = StaticSource(vec![
            pod("api", "120m", "256Mi"),
            pod("worker", "80m", "128Mi"),
        ]);
        let cycle = ScrapeCycle::new(
            MetricCollector::new(Arc::new(source)),
            provider.clone(),
            WeaviateGateway::new(url, None).unwrap(),
            class(),
            HealthRegistry::new(&[Component::Collector, Component::Embedder, Component::Store]),
        );
        (cycle, provider)
    }

    #[tokio::test]
    async fn test_cycle_ingests_then_query_answers() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/.well-known/ready")
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/schema")
            .with_status(200)
            .create_async()
            .await;
        let batch = server
            .mock("POST", "/v1/batch/objects")
            .match_body(Matcher::PartialJson(json!({
                "objects": [
                    { "properties": { "namespace": "default", "name": "api", "cpu": "120m", "mem": "256Mi" },
                      "vector": [0.25, 0.5, 0.75, 1.0] },
                    { "properties": { "namespace": "default", "name": "worker", "cpu": "80m", "mem": "128Mi" },
                      "vector": [0.25, 0.5, 0.75, 1.0] }
                ]
            })))
            .with_status(200)
            .with_body(r#"[{"id":"1","result":{}},{"id":"2","result":{}}]"#)
            .create_async()
            .await;
        let generation = server
            .mock("POST", "/v1/graphql")
            .match_body(Matcher::Regex("which pod uses the most CPU".to_string()))
            .with_status(200)
            .with_body(
                json!({ "data": { "Get": { "Pod": [
                    { "name": "api", "cpu": "120m", "_additional": { "generate": {
                        "groupedResult": "The api pod uses the most CPU at 120m.", "error": null } } },
                    { "name": "worker", "cpu": "80m", "_additional": { "generate": null } }
                ] } } })
                .to_string(),
            )
            .create_async()
            .await;

        let (cycle, provider) = scrape_cycle(server.url(), None);
        let report = cycle.run().await.unwrap();

        assert_eq!(report, CycleReport { collected: 2, ingested: 2 });
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        batch.assert_async().await;

        let query = QueryService::new(
            WeaviateGateway::new(server.url(), None).unwrap(),
            StructuredLogger::new("serve"),
            PipelineMetrics::new(),
            HealthRegistry::new(&[Component::Query]),
        );
        let answer = query.answer("which pod uses the most CPU").await.unwrap();

        assert!(answer.is_some_and(|text| !text.is_empty()));
        generation.assert_async().await;
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_store_untouched() {
        let mut server = mockito::Server::new_async().await;
        let ready = server
            .mock("GET", "/v1/.well-known/ready")
            .expect(0)
            .create_async()
            .await;
        let batch = server
            .mock("POST", "/v1/batch/objects")
            .expect(0)
            .create_async()
            .await;

        let (cycle, _provider) = scrape_cycle(server.url(), Some(1));
        let err = cycle.run_once().await.unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        ready.assert_async().await;
        batch.assert_async().await;

        let health = cycle.health.health().await;
        assert_eq!(
            health.components[&Component::Embedder].status,
            crate::health::ComponentStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_unready_store_aborts_before_schema() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/.well-known/ready")
            .with_status(503)
            .create_async()
            .await;
        let schema = server
            .mock("POST", "/v1/schema")
            .expect(0)
            .create_async()
            .await;

        let (cycle, _provider) = scrape_cycle(server.url(), None);
        let err = cycle.run().await.unwrap_err();

        assert!(matches!(err, Error::StoreUnavailable(_)));
        schema.assert_async().await;
    }

    async fn ready_store_with_batch(status: usize, body: &str) -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/.well-known/ready")
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/schema")
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/batch/objects")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;
        server
    }

    #[tokio::test]
    async fn test_rejected_batch_credits_no_objects() {
        let server = ready_store_with_batch(500, "store down").await;

        let (cycle, _provider) = scrape_cycle(server.url(), None);
        let err = cycle.run().await.unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert_eq!(err.accepted_objects(), None);

        let health = cycle.health.health().await;
        let store = &health.components[&Component::Store];
        assert_eq!(store.status, crate::health::ComponentStatus::Unhealthy);
        assert_eq!(store.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_partial_failure_counts_objects_not_messages() {
        let body = json!([
            { "id": "1", "result": {} },
            { "id": "2", "result": { "errors": { "error": [
                { "message": "invalid text property 'cpu'" },
                { "message": "invalid text property 'mem'" }
            ] } } }
        ])
        .to_string();
        let server = ready_store_with_batch(200, &body).await;

        let (cycle, _provider) = scrape_cycle(server.url(), None);
        let err = cycle.run().await.unwrap_err();

        assert_eq!(err.failed_messages().len(), 2);
        assert_eq!(err.accepted_objects(), Some(1));
        assert!(err.to_string().starts_with("batch ingestion rejected 1 of 2 object(s):"));
    }
}
