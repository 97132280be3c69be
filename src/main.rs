//! ThemeHub Sync Pipeline
//!
//! Background service mirroring themes between the community GitHub repository
//! and the marketplace database, and draining queued publish requests into
//! pull requests.

mod config;
mod db;
mod errors;
mod github;
mod jobs;
mod models;
mod storage;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::{JobQueueRepository, ThemeRepository};
use github::{GithubClient, ThemePublisher, ThemeSource};
use jobs::{DrainJob, Scheduler, SyncJob};
use storage::{AssetStore, HttpAssetStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ThemeHub sync pipeline");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!(
        "Themes repository: {}/{} (branch {}, path {})",
        config.github_owner,
        config.github_repo,
        config.github_branch,
        config.themes_path
    );

    // Warn if the write side is not configured
    if config.github_token.is_none() {
        tracing::warn!(
            "No GitHub token configured (THEMEHUB_GITHUB_TOKEN). Publish path is disabled!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let themes = ThemeRepository::new(pool.clone());
    let queue = JobQueueRepository::new(pool);

    // Remote repository client serves both seams
    let github = Arc::new(GithubClient::new(&config)?);

    let sync_job = Arc::new(SyncJob::new(
        Arc::clone(&github) as Arc<dyn ThemeSource>,
        themes.clone(),
        queue.clone(),
    ));

    let drain_job = if config.github_token.is_some() {
        let assets = Arc::new(HttpAssetStore::new(&config)?) as Arc<dyn AssetStore>;
        Some(Arc::new(DrainJob::new(
            &config,
            queue,
            themes,
            assets,
            Arc::clone(&github) as Arc<dyn ThemePublisher>,
        )))
    } else {
        None
    };

    // Start the scheduler
    let scheduler = Scheduler::new(sync_job, drain_job, &config);
    let handles = scheduler.start();
    tracing::info!(
        "Scheduler started (sync every {}s, drain every {}s)",
        config.sync_interval_secs,
        config.drain_interval_secs
    );

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    scheduler.stop();
    for handle in handles {
        handle.await.ok();
    }

    Ok(())
}

#[cfg(test)]
mod tests;
