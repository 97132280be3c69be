//! Theme job queue drain job.
//!
//! Converts pending publish/unpublish requests into one batched change set
//! against the themes repository: uploaded assets plus a generated meta.json
//! for each CREATE, a directory removal for each DELETE, all submitted as a
//! single pull request. Queue entries are only removed after the submission
//! is confirmed, so a failed run retries the same batch on the next tick.

use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{JobQueueRepository, ThemeRepository};
use crate::errors::AppError;
use crate::github::{ChangeSet, FileAddition, PullRequestRef, ThemePublisher};
use crate::models::{JobAction, RemoteThemeMetadata, ThemeJobQueueEntry};
use crate::storage::AssetStore;

/// Files the publish endpoint uploads for every theme.
const ASSET_FILES: [&str; 3] = ["styles.json", "styles.css", "settings.json"];

/// Counters for one drain run.
#[derive(Debug, Clone, Default)]
pub struct DrainOutcome {
    /// Entries submitted and removed from the queue
    pub consumed: u64,
    /// Entries left queued for the next run
    pub skipped: u64,
    pub pull_request: Option<PullRequestRef>,
}

/// Background job draining the theme job queue into pull requests.
pub struct DrainJob {
    queue: JobQueueRepository,
    themes: ThemeRepository,
    assets: Arc<dyn AssetStore>,
    publisher: Arc<dyn ThemePublisher>,
    bucket: String,
    themes_path: String,
    repo_url: String,
}

impl DrainJob {
    pub fn new(
        config: &Config,
        queue: JobQueueRepository,
        themes: ThemeRepository,
        assets: Arc<dyn AssetStore>,
        publisher: Arc<dyn ThemePublisher>,
    ) -> Self {
        Self {
            queue,
            themes,
            assets,
            publisher,
            bucket: config.asset_bucket.clone(),
            themes_path: config.themes_path.clone(),
            repo_url: format!(
                "https://github.com/{}/{}",
                config.github_owner, config.github_repo
            ),
        }
    }

    /// Run one drain pass.
    pub async fn run(&self) -> Result<DrainOutcome, AppError> {
        let entries = self.queue.pending().await?;
        if entries.is_empty() {
            return Ok(DrainOutcome::default());
        }

        let (deduped, superseded) = dedupe_entries(entries);
        if !superseded.is_empty() {
            info!(
                "De-duplicated {} queue entries down to {}",
                deduped.len() + superseded.len(),
                deduped.len()
            );
        }

        let mut additions = Vec::new();
        let mut removals = Vec::new();
        let mut consumed = Vec::new();
        let mut skipped = 0u64;

        for entry in deduped {
            match entry.action {
                JobAction::Create => match self.stage_create(&entry).await {
                    Ok(Some(files)) => {
                        additions.extend(files);
                        consumed.push(entry);
                    }
                    Ok(None) => {
                        skipped += 1;
                        warn!(
                            "No uploaded assets for theme {}, leaving job queued",
                            entry.theme_id
                        );
                    }
                    Err(e) => {
                        skipped += 1;
                        warn!(
                            "Failed to stage theme {}: {}, leaving job queued",
                            entry.theme_id, e
                        );
                    }
                },
                JobAction::Delete => {
                    removals.push(format!("{}/{}", self.themes_path, entry.theme_id));
                    consumed.push(entry);
                }
            }
        }

        let change_set = ChangeSet {
            title: format!("Apply {} queued theme change(s)", consumed.len()),
            body: "Automated change set generated from the theme job queue.".to_string(),
            additions,
            removals,
        };

        if change_set.is_empty() {
            return Ok(DrainOutcome {
                consumed: 0,
                skipped,
                pull_request: None,
            });
        }

        // A submission failure leaves every entry queued for the next tick.
        let pr = self.publisher.submit(&change_set).await?;

        // Per-entry catalog effects; one failed row does not abort siblings.
        for entry in &consumed {
            let result = match entry.action {
                JobAction::Create => self.themes.apply_publish(entry).await,
                JobAction::Delete => self.themes.apply_unpublish(&entry.theme_id).await,
            };
            if let Err(e) = result {
                warn!(
                    "Failed to apply consumed job {} for theme {}: {}",
                    entry.id, entry.theme_id, e
                );
            }
        }

        // Remove every row for a resolved theme, superseded losers included,
        // so a dropped entry cannot resurface on a later tick.
        let resolved: HashSet<&str> = consumed
            .iter()
            .map(|entry| entry.theme_id.as_str())
            .collect();
        let mut ids: Vec<String> = consumed.iter().map(|entry| entry.id.clone()).collect();
        ids.extend(
            superseded
                .iter()
                .filter(|entry| resolved.contains(entry.theme_id.as_str()))
                .map(|entry| entry.id.clone()),
        );
        self.queue.remove(&ids).await?;
        info!(
            "Drained {} queue entries into pull request #{}",
            ids.len(),
            pr.number
        );

        Ok(DrainOutcome {
            consumed: consumed.len() as u64,
            skipped,
            pull_request: Some(pr),
        })
    }

    /// Stage the file additions for one CREATE entry.
    ///
    /// Returns None when no uploaded asset exists yet; the entry stays queued.
    async fn stage_create(
        &self,
        entry: &ThemeJobQueueEntry,
    ) -> Result<Option<Vec<FileAddition>>, AppError> {
        let mut staged = Vec::new();

        for file_name in ASSET_FILES {
            let key = format!("{}/{}", entry.theme_id, file_name);
            if let Some(content) = self.assets.get_object(&self.bucket, &key).await? {
                staged.push(FileAddition {
                    path: format!("{}/{}/{}", self.themes_path, entry.theme_id, file_name),
                    content,
                });
            }
        }

        if staged.is_empty() {
            return Ok(None);
        }

        staged.push(FileAddition {
            path: format!("{}/{}/meta.json", self.themes_path, entry.theme_id),
            content: synthesize_meta(entry, &self.repo_url)?,
        });

        Ok(Some(staged))
    }
}

/// Resolve duplicate entries per theme id, keeping only the latest by
/// creation timestamp (last-writer-wins). Expects input ordered oldest first.
/// Superseded entries are returned alongside the survivors: their rows must
/// still be removed once the surviving entry is acted upon.
fn dedupe_entries(
    entries: Vec<ThemeJobQueueEntry>,
) -> (Vec<ThemeJobQueueEntry>, Vec<ThemeJobQueueEntry>) {
    let mut latest: HashMap<String, ThemeJobQueueEntry> = HashMap::new();
    let mut superseded = Vec::new();
    for entry in entries {
        if let Some(loser) = latest.insert(entry.theme_id.clone(), entry) {
            superseded.push(loser);
        }
    }

    let mut result: Vec<ThemeJobQueueEntry> = latest.into_values().collect();
    result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    (result, superseded)
}

/// Generate the meta.json content for a queued theme.
fn synthesize_meta(entry: &ThemeJobQueueEntry, repo_url: &str) -> Result<Bytes, AppError> {
    let metadata = RemoteThemeMetadata {
        name: entry.name.clone(),
        description: entry.description.clone(),
        author: Some(entry.user_id.clone()),
        github: Some(repo_url.to_string()),
        tags: Vec::new(),
        version: entry.version.clone(),
    };

    Ok(Bytes::from(serde_json::to_vec_pretty(&metadata)?))
}
