//! Process roles: wiring settings into components and running them

use crate::AGENT_VERSION;
use anyhow::Result;
use podlens_lib::{
    api::{self, AppState},
    collector::{KubeMetricsSource, MetricCollector},
    embedding::provider_from_settings,
    health::{Component, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
    pipeline::ScrapeCycle,
    query::QueryService,
    retention::RetentionSweeper,
    scheduler::{Cycle, Scheduler},
    store::{pod_class, WeaviateGateway},
    Settings,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Collect, embed, and ingest on a fixed period
pub async fn scrape(settings: Settings) -> Result<()> {
    let logger = StructuredLogger::new("scrape");
    logger.log_startup(AGENT_VERSION, Some(settings.scrape_interval_secs));

    let health = HealthRegistry::new(&[
        Component::Collector,
        Component::Embedder,
        Component::Store,
    ]);

    let source = KubeMetricsSource::new(settings.cluster_access()?);
    let provider = provider_from_settings(&settings)?;
    info!(provider = ?provider.kind(), "Embedding provider selected");

    let cycle = ScrapeCycle::new(
        MetricCollector::new(Arc::new(source)),
        provider,
        WeaviateGateway::from_settings(&settings)?,
        pod_class(&settings)?,
        health.clone(),
    );
    let scheduler = Scheduler::new("scrape", settings.scrape_interval())?;

    run_scheduled(settings.listen_port, health, logger, scheduler, cycle).await
}

/// Delete expired objects on a fixed period
pub async fn sweep(settings: Settings) -> Result<()> {
    let logger = StructuredLogger::new("sweep");
    logger.log_startup(AGENT_VERSION, Some(settings.cleanup_interval_secs));

    let health = HealthRegistry::new(&[Component::Sweeper]);

    let sweeper = RetentionSweeper::new(
        WeaviateGateway::from_settings(&settings)?,
        settings.retention(),
        health.clone(),
    )?;
    info!(retention_secs = settings.retention_secs, "Retention window configured");
    let scheduler = Scheduler::new("sweep", settings.cleanup_interval())?;

    run_scheduled(settings.listen_port, health, logger, scheduler, sweeper).await
}

/// Answer queries until a shutdown signal arrives
pub async fn serve(settings: Settings) -> Result<()> {
    let logger = StructuredLogger::new("serve");
    logger.log_startup(AGENT_VERSION, None);

    let health = HealthRegistry::new(&[Component::Query]);

    let metrics = PipelineMetrics::new();
    let query = QueryService::new(
        WeaviateGateway::from_settings(&settings)?,
        logger.clone(),
        metrics.clone(),
        health.clone(),
    );
    let state = Arc::new(AppState::new(health.clone(), metrics).with_query(Arc::new(query)));

    health.mark_started().await;

    api::serve(settings.listen_port, state, async {
        shutdown_signal().await;
    })
    .await?;

    logger.log_shutdown("signal received");
    Ok(())
}

/// Run `cycle` on `scheduler` next to the health server
///
/// Returns the first cycle error, which ends the process.
async fn run_scheduled<C>(
    port: u16,
    health: HealthRegistry,
    logger: StructuredLogger,
    scheduler: Scheduler,
    cycle: C,
) -> Result<()>
where
    C: Cycle + 'static,
{
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = Arc::new(AppState::new(health.clone(), PipelineMetrics::new()));
    let mut api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(api::serve(port, state, async move {
        let _ = api_shutdown.recv().await;
    }));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(());
    });

    health.mark_started().await;

    let outcome = scheduler.run(&cycle, shutdown_tx.subscribe()).await;
    match &outcome {
        Ok(()) => logger.log_shutdown("signal received"),
        Err(e) => {
            error!(error = %e, "Cycle failed, exiting");
            logger.log_shutdown("cycle failed");
        }
    }

    let _ = shutdown_tx.send(());
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task panicked"),
        Ok(Ok(())) => {}
    }

    outcome.map_err(anyhow::Error::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
