//! Fixed-period cycle scheduling
//!
//! A cycle runs after each full period, the first one a whole period after
//! start. The first failing cycle stops the schedule and its error is handed
//! back to the caller.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// One unit of periodic work
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run_once(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    name: String,
    period: Duration,
}

impl Scheduler {
    pub fn new(name: impl Into<String>, period: Duration) -> Result<Self> {
        let name = name.into();
        if period.is_zero() {
            return Err(Error::Config(format!("{} period must be greater than zero", name)));
        }
        Ok(Self { name, period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run `cycle` until shutdown is signalled or a cycle fails
    ///
    /// A cycle in progress is allowed to finish before shutdown is observed.
    pub async fn run<C>(&self, cycle: &C, mut shutdown: broadcast::Receiver<()>) -> Result<()>
    where
        C: Cycle + ?Sized,
    {
        info!(
            schedule = %self.name,
            period_secs = self.period.as_secs(),
            "Starting schedule"
        );

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    runs += 1;
                    debug!(schedule = %self.name, run = runs, "Running cycle");
                    cycle.run_once().await?;
                }
                _ = shutdown.recv() => {
                    info!(schedule = %self.name, runs = runs, "Stopping schedule");
                    return Ok(());
                }
            }
        }
    }
}
