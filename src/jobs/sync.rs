//! Theme sync job.
//!
//! Mirrors the remote themes repository into the local catalog: themes found
//! remotely but absent locally are created (with their declared version);
//! themes gone from the remote are deleted unless a queued job still has them
//! in flight. Themes present on both sides are left untouched.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{JobQueueRepository, ThemeRepository};
use crate::errors::AppError;
use crate::github::ThemeSource;

/// Mutations needed to bring the local catalog in line with the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_create: Vec<String>,
    pub to_delete: Vec<String>,
}

impl ReconcilePlan {
    /// Diff local ids against the remote listing, holding back any id with a
    /// pending queue job. Output is sorted so repeated runs are comparable.
    pub fn compute(local: &[String], remote: &[String], in_flight: &[String]) -> Self {
        let local_set: HashSet<&str> = local.iter().map(String::as_str).collect();
        let remote_set: HashSet<&str> = remote.iter().map(String::as_str).collect();
        let in_flight_set: HashSet<&str> = in_flight.iter().map(String::as_str).collect();

        let mut to_delete: Vec<String> = local_set
            .iter()
            .filter(|id| !remote_set.contains(*id) && !in_flight_set.contains(*id))
            .map(|id| id.to_string())
            .collect();
        to_delete.sort();

        let mut to_create: Vec<String> = remote_set
            .iter()
            .filter(|id| !local_set.contains(*id))
            .map(|id| id.to_string())
            .collect();
        to_create.sort();

        Self {
            to_create,
            to_delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub created: u64,
    pub deleted: u64,
    pub skipped: u64,
}

/// Background job reconciling the remote repository with the local catalog.
pub struct SyncJob {
    source: Arc<dyn ThemeSource>,
    themes: ThemeRepository,
    queue: JobQueueRepository,
}

impl SyncJob {
    pub fn new(
        source: Arc<dyn ThemeSource>,
        themes: ThemeRepository,
        queue: JobQueueRepository,
    ) -> Self {
        Self {
            source,
            themes,
            queue,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// A listing failure aborts the pass with zero mutations; an empty but
    /// successful listing genuinely means the remote has no themes. Metadata
    /// and persistence failures are isolated to their theme.
    pub async fn run(&self) -> Result<SyncOutcome, AppError> {
        let remote_ids = self.source.list_theme_ids().await?;
        let local_ids = self.themes.list_theme_ids().await?;
        let in_flight = self.queue.pending_theme_ids().await?;

        let plan = ReconcilePlan::compute(&local_ids, &remote_ids, &in_flight);
        if plan.is_empty() {
            info!("Theme catalog already in sync ({} themes)", local_ids.len());
            return Ok(SyncOutcome::default());
        }

        let mut outcome = SyncOutcome::default();

        if !plan.to_delete.is_empty() {
            outcome.deleted = self.themes.delete_themes(&plan.to_delete).await?;
            info!("Deleted themes no longer on the remote: {:?}", plan.to_delete);
        }

        for theme_id in &plan.to_create {
            let metadata = match self.source.fetch_metadata(theme_id).await {
                Ok(Some(metadata)) => metadata,
                Ok(None) => {
                    outcome.skipped += 1;
                    warn!("Missing meta.json data for theme {}, skipping", theme_id);
                    continue;
                }
                Err(e) => {
                    outcome.skipped += 1;
                    warn!("Failed to fetch meta.json for theme {}: {}", theme_id, e);
                    continue;
                }
            };

            match self
                .themes
                .create_theme_with_version(theme_id, &metadata)
                .await
            {
                Ok(_) => {
                    outcome.created += 1;
                    info!("Created theme and version in catalog: {}", theme_id);
                }
                Err(e) => {
                    outcome.skipped += 1;
                    warn!("Failed to create theme {}: {}", theme_id, e);
                }
            }
        }

        Ok(outcome)
    }
}
