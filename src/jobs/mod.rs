//! Background jobs and their scheduler.
//!
//! Two timer-driven jobs share the process: the sync job mirrors the remote
//! repository into the catalog, the drain job turns queued publish requests
//! into pull requests. Each job type carries a run guard so a slow run is
//! skipped over by the next tick instead of overlapped.

mod drain;
mod sync;

pub use drain::*;
pub use sync::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::Config;

/// Process-lifetime scheduler for the sync and drain jobs.
///
/// The sync job fires once immediately at startup, then on its period; the
/// drain job waits one full period before its first run.
pub struct Scheduler {
    sync_job: Arc<SyncJob>,
    drain_job: Option<Arc<DrainJob>>,
    sync_interval: Duration,
    drain_interval: Duration,
    sync_guard: Arc<Mutex<()>>,
    drain_guard: Arc<Mutex<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(sync_job: Arc<SyncJob>, drain_job: Option<Arc<DrainJob>>, config: &Config) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            sync_job,
            drain_job,
            sync_interval: Duration::from_secs(config.sync_interval_secs),
            drain_interval: Duration::from_secs(config.drain_interval_secs),
            sync_guard: Arc::new(Mutex::new(())),
            drain_guard: Arc::new(Mutex::new(())),
            shutdown_tx,
        }
    }

    /// Spawn one background task per scheduled job.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.spawn_sync_task()];
        if let Some(drain_job) = &self.drain_job {
            handles.push(self.spawn_drain_task(Arc::clone(drain_job)));
        }
        handles
    }

    /// Signal all scheduled tasks to exit after their current tick.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn spawn_sync_task(&self) -> JoinHandle<()> {
        let job = Arc::clone(&self.sync_job);
        let guard = Arc::clone(&self.sync_guard);
        let period = self.sync_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("Sync task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let job = Arc::clone(&job);
                        let guard = Arc::clone(&guard);
                        tokio::spawn(async move {
                            let _lock = match guard.try_lock() {
                                Ok(lock) => lock,
                                Err(_) => {
                                    warn!("Previous theme sync still running, skipping this tick");
                                    return;
                                }
                            };
                            match job.run().await {
                                Ok(outcome) => info!(
                                    "Theme sync complete: {} created, {} deleted, {} skipped",
                                    outcome.created, outcome.deleted, outcome.skipped
                                ),
                                Err(e) => error!("Theme sync failed: {}", e),
                            }
                        });
                    }
                }
            }
        })
    }

    fn spawn_drain_task(&self, job: Arc<DrainJob>) -> JoinHandle<()> {
        let guard = Arc::clone(&self.drain_guard);
        let period = self.drain_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Consume the immediate tick: the queue drains on a delay, not at boot
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("Drain task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let job = Arc::clone(&job);
                        let guard = Arc::clone(&guard);
                        tokio::spawn(async move {
                            let _lock = match guard.try_lock() {
                                Ok(lock) => lock,
                                Err(_) => {
                                    warn!("Previous queue drain still running, skipping this tick");
                                    return;
                                }
                            };
                            match job.run().await {
                                Ok(outcome) => {
                                    if outcome.consumed > 0 || outcome.skipped > 0 {
                                        info!(
                                            "Queue drain complete: {} consumed, {} skipped",
                                            outcome.consumed, outcome.skipped
                                        );
                                    }
                                }
                                Err(e) => error!("Queue drain failed: {}", e),
                            }
                        });
                    }
                }
            }
        })
    }
}
