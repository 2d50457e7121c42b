//! Liveness and readiness of the stages a role drives
//!
//! A role declares its components up front and every cycle records the
//! outcome of each stage it reached. `/healthz` reports the worst component
//! status; `/readyz` additionally requires the role to have started.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A pipeline stage whose health is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Collector,
    Embedder,
    Store,
    Sweeper,
    Query,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Collector => "collector",
            Component::Embedder => "embedder",
            Component::Store => "store",
            Component::Sweeper => "sweeper",
            Component::Query => "query",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// The last run finished but left work undone
    Degraded,
    /// The last run failed
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failed runs since the last one that completed
    pub consecutive_failures: u32,
    /// Unix seconds of the last completed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_timestamp: Option<i64>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn registered() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            last_success_timestamp: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    fn completed(&mut self, status: ComponentStatus, message: Option<String>) {
        let now = chrono::Utc::now().timestamp();
        self.status = status;
        self.message = message;
        self.consecutive_failures = 0;
        self.last_success_timestamp = Some(now);
        self.last_check_timestamp = now;
    }

    fn failed(&mut self, message: String) {
        self.status = ComponentStatus::Unhealthy;
        self.message = Some(message);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_check_timestamp = chrono::Utc::now().timestamp();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<Component, ComponentHealth>,
    started: bool,
}

/// Shared health of one role; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    /// Registry tracking `components`, each initially healthy
    pub fn new(components: &[Component]) -> Self {
        let components = components
            .iter()
            .map(|&c| (c, ComponentHealth::registered()))
            .collect();

        Self {
            state: Arc::new(RwLock::new(RegistryState {
                components,
                started: false,
            })),
        }
    }

    /// Record the outcome of one run of `component`
    pub async fn record<T>(&self, component: Component, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.record_success(component).await,
            Err(e) => self.record_failure(component, e).await,
        }
    }

    pub async fn record_success(&self, component: Component) {
        self.entry(component, |h| h.completed(ComponentStatus::Healthy, None))
            .await;
    }

    pub async fn record_failure(&self, component: Component, error: &Error) {
        let message = error.to_string();
        self.entry(component, |h| h.failed(message)).await;
    }

    /// The run completed but left work behind
    pub async fn record_degraded(&self, component: Component, message: impl Into<String>) {
        let message = message.into();
        self.entry(component, |h| {
            h.completed(ComponentStatus::Degraded, Some(message))
        })
        .await;
    }

    /// Mark the role as started; readiness is withheld until then
    pub async fn mark_started(&self) {
        self.state.write().await.started = true;
    }

    async fn entry(&self, component: Component, update: impl FnOnce(&mut ComponentHealth)) {
        let mut state = self.state.write().await;
        update(
            state
                .components
                .entry(component)
                .or_insert_with(ComponentHealth::registered),
        );
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        HealthResponse { status, components }
    }

    /// Ready once started and while no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        if !state.started {
            return ReadinessResponse {
                ready: false,
                reason: Some("role has not started".to_string()),
            };
        }

        let failing: Vec<&str> = state
            .components
            .iter()
            .filter(|(_, h)| h.status == ComponentStatus::Unhealthy)
            .map(|(c, _)| c.as_str())
            .collect();

        if failing.is_empty() {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some(format!("unhealthy: {}", failing.join(", "))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_down() -> Error {
        Error::StoreUnavailable("received status code 503".to_string())
    }

    #[tokio::test]
    async fn test_declared_components_start_healthy() {
        let registry = HealthRegistry::new(&[Component::Collector, Component::Store]);
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components.len(), 2);
        assert_eq!(health.components[&Component::Store].last_success_timestamp, None);
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::new(&[Component::Collector, Component::Sweeper]);

        registry
            .record_degraded(Component::Sweeper, "1 object(s) could not be deleted")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.record_failure(Component::Collector, &store_down()).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_failures_accumulate_until_success() {
        let registry = HealthRegistry::new(&[Component::Store]);

        registry.record::<()>(Component::Store, &Err(store_down())).await;
        registry.record::<()>(Component::Store, &Err(store_down())).await;

        let health = registry.health().await;
        let store = &health.components[&Component::Store];
        assert_eq!(store.consecutive_failures, 2);
        assert!(store.message.as_deref().unwrap().contains("503"));

        registry.record(Component::Store, &Ok(())).await;

        let health = registry.health().await;
        let store = &health.components[&Component::Store];
        assert_eq!(store.status, ComponentStatus::Healthy);
        assert_eq!(store.consecutive_failures, 0);
        assert!(store.message.is_none());
        assert!(store.last_success_timestamp.is_some());
    }

    #[tokio::test]
    async fn test_undeclared_component_is_tracked_on_first_record() {
        let registry = HealthRegistry::default();
        registry.record_failure(Component::Query, &store_down()).await;

        let health = registry.health().await;
        assert_eq!(
            health.components[&Component::Query].status,
            ComponentStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_not_ready_before_start() {
        let registry = HealthRegistry::new(&[Component::Query]);
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());

        registry.mark_started().await;
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_readiness_names_unhealthy_components_and_recovers() {
        let registry = HealthRegistry::new(&[Component::Embedder, Component::Store]);
        registry.mark_started().await;

        registry.record_failure(Component::Store, &store_down()).await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("unhealthy: store"));

        registry.record_success(Component::Store).await;
        assert!(registry.readiness().await.ready);
    }

    #[test]
    fn test_components_serialize_as_lowercase_keys() {
        let mut components = BTreeMap::new();
        components.insert(Component::Sweeper, ComponentHealth::registered());
        let value = serde_json::to_value(HealthResponse {
            status: ComponentStatus::Healthy,
            components,
        })
        .unwrap();

        assert_eq!(value["status"], "healthy");
        assert_eq!(value["components"]["sweeper"]["consecutive_failures"], 0);
    }
}
