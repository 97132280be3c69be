//! Configuration module for the sync pipeline.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Owner of the themes repository on GitHub
    pub github_owner: String,
    /// Name of the themes repository on GitHub
    pub github_repo: String,
    /// Base branch of the themes repository
    pub github_branch: String,
    /// Path inside the repository holding one directory per theme
    pub themes_path: String,
    /// Personal access token for the write side (publish path disabled if unset)
    pub github_token: Option<String>,
    /// Endpoint of the asset store serving uploaded theme files
    pub asset_endpoint: String,
    /// Bucket holding uploaded assets for queued theme jobs
    pub asset_bucket: String,
    /// Seconds between theme sync runs
    pub sync_interval_secs: u64,
    /// Seconds between job queue drain runs
    pub drain_interval_secs: u64,
    /// Timeout applied to every outbound HTTP request, in seconds
    pub request_timeout_secs: u64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("THEMEHUB_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let github_owner =
            env::var("THEMEHUB_GITHUB_OWNER").unwrap_or_else(|_| "themehub".to_string());
        let github_repo =
            env::var("THEMEHUB_GITHUB_REPO").unwrap_or_else(|_| "community-themes".to_string());
        let github_branch =
            env::var("THEMEHUB_GITHUB_BRANCH").unwrap_or_else(|_| "main".to_string());
        let themes_path =
            env::var("THEMEHUB_THEMES_PATH").unwrap_or_else(|_| "themes".to_string());
        let github_token = env::var("THEMEHUB_GITHUB_TOKEN").ok();

        let asset_endpoint =
            env::var("THEMEHUB_ASSET_ENDPOINT").unwrap_or_else(|_| "http://minio:9000".to_string());
        let asset_bucket =
            env::var("THEMEHUB_ASSET_BUCKET").unwrap_or_else(|_| "theme-jobs".to_string());

        let sync_interval_secs = env::var("THEMEHUB_SYNC_INTERVAL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .expect("Invalid THEMEHUB_SYNC_INTERVAL_SECS format");

        let drain_interval_secs = env::var("THEMEHUB_DRAIN_INTERVAL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .expect("Invalid THEMEHUB_DRAIN_INTERVAL_SECS format");

        let request_timeout_secs = env::var("THEMEHUB_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .expect("Invalid THEMEHUB_REQUEST_TIMEOUT_SECS format");

        let log_level = env::var("THEMEHUB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            db_path,
            github_owner,
            github_repo,
            github_branch,
            themes_path,
            github_token,
            asset_endpoint,
            asset_bucket,
            sync_interval_secs,
            drain_interval_secs,
            request_timeout_secs,
            log_level,
        }
    }
}
