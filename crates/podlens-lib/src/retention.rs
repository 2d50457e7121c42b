//! Retention sweeps over stored metric objects

use crate::error::{Error, Result};
use crate::health::{Component, HealthRegistry};
use crate::models::DeleteReport;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::scheduler::Cycle;
use crate::store::WeaviateGateway;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};

pub struct RetentionSweeper {
    gateway: WeaviateGateway,
    retention: chrono::Duration,
    health: HealthRegistry,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl RetentionSweeper {
    /// Objects older than `retention` are removed; zero removes everything
    /// created before the sweep started
    pub fn new(gateway: WeaviateGateway, retention: Duration, health: HealthRegistry) -> Result<Self> {
        let retention = chrono::Duration::from_std(retention)
            .map_err(|e| Error::Config(format!("retention window out of range: {}", e)))?;

        Ok(Self {
            gateway,
            retention,
            health,
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("sweep"),
        })
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    pub async fn sweep(&self) -> Result<DeleteReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Delete every object created strictly before `now - retention`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<DeleteReport> {
        let started = Instant::now();
        let cutoff = self.cutoff(now);

        let report = match self.gateway.delete_older_than(cutoff).await {
            Ok(report) => report,
            Err(e) => {
                self.health.record_failure(Component::Sweeper, &e).await;
                return Err(e);
            }
        };

        for id in &report.ids {
            self.logger.log_object_deleted(id);
        }
        self.logger.log_sweep(
            &cutoff.to_rfc3339_opts(SecondsFormat::Secs, true),
            report.matched,
            report.deleted,
            report.failed,
        );
        self.metrics.add_objects_deleted(report.deleted);
        self.metrics
            .observe_sweep_cycle(started.elapsed().as_secs_f64());

        if report.failed > 0 {
            self.health
                .record_degraded(
                    Component::Sweeper,
                    format!("{} object(s) could not be deleted", report.failed),
                )
                .await;
        } else {
            self.health.record_success(Component::Sweeper).await;
        }

        Ok(report)
    }
}

#[async_trait]
impl Cycle for RetentionSweeper {
    async fn run_once(&self) -> Result<()> {
        match self.sweep().await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.metrics.inc_cycle_errors(self.logger.role());
                self.logger.log_cycle_error(&e.to_string());
                Err(e)
            }
        }
    }
}
