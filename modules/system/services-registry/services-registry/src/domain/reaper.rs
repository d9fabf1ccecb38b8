//! Periodic removal of services that stopped sending heartbeats.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::DomainError;
use crate::domain::ports::{IdentityStore, WorkerDirectory};
use crate::domain::repo::ServicesRepository;
use crate::domain::service::Service;

/// Counters from a single reaper pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapReport {
    /// Trusted services found past the liveness threshold.
    pub scanned: usize,
    /// Services deleted together with their dependents.
    pub reaped: usize,
    /// Services that heartbeated again or were claimed elsewhere before
    /// they could be deleted.
    pub skipped: usize,
    /// Services whose cascading delete failed and were left in place.
    pub failed: usize,
}

/// Deletes every service whose heartbeat is older than `dead_after`.
///
/// Each candidate is claimed and re-checked before the regular cascading
/// delete runs, so a service that heartbeats after the scan survives, and a
/// hatchery's workers and a service's consumer identity go with a dead one.
pub struct DeadServiceReaper<R, W, I> {
    service: Service<R, W, I>,
    dead_after: Duration,
    interval: Duration,
}

impl<R, W, I> DeadServiceReaper<R, W, I>
where
    R: ServicesRepository,
    W: WorkerDirectory,
    I: IdentityStore,
{
    #[must_use]
    pub fn new(service: Service<R, W, I>, dead_after: Duration, interval: Duration) -> Self {
        Self {
            service,
            dead_after,
            interval,
        }
    }

    /// Scan once and delete what is dead. A failing delete is counted and
    /// logged; it does not stop the pass.
    ///
    /// # Errors
    /// Returns an error only when the scan itself fails.
    #[instrument(skip(self), fields(dead_after_secs = self.dead_after.as_secs()))]
    pub async fn run_once(&self) -> Result<ReapReport, DomainError> {
        let dead = self.service.find_dead(self.dead_after).await?;
        let mut report = ReapReport {
            scanned: dead.len(),
            ..ReapReport::default()
        };

        for record in &dead {
            match self.service.delete_if_dead(record, self.dead_after).await {
                Ok(false) => report.skipped += 1,
                Ok(true) => {
                    report.reaped += 1;
                    info!(
                        service_id = record.id,
                        name = %record.name,
                        last_heartbeat = %record.last_heartbeat,
                        "Dead service reaped"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(service_id = record.id, error = %e, "Failed to reap dead service");
                }
            }
        }

        debug!(?report, "Reaper pass finished");
        Ok(report)
    }

    /// Run passes on a fixed interval until `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Dead service reaper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "Reaper pass failed");
                    }
                }
            }
        }
    }
}
