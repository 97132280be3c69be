//! Integration tests for the sync pipeline.
//!
//! Jobs run against a real temp-directory SQLite database; the remote seams
//! (theme source, publisher, asset store) are replaced with in-memory mocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, JobQueueRepository, ThemeRepository};
use crate::errors::AppError;
use crate::github::{ChangeSet, PullRequestRef, ThemePublisher, ThemeSource};
use crate::jobs::{DrainJob, Scheduler, SyncJob};
use crate::models::{JobAction, NewThemeJob, RemoteThemeMetadata};
use crate::storage::AssetStore;

/// Remote theme source backed by in-memory state.
struct MockSource {
    listing: Mutex<Result<Vec<String>, String>>,
    metadata: Mutex<HashMap<String, RemoteThemeMetadata>>,
    calls: AtomicUsize,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
    delay_ms: u64,
}

impl MockSource {
    fn new() -> Self {
        Self::with_delay(0)
    }

    fn with_delay(delay_ms: u64) -> Self {
        Self {
            listing: Mutex::new(Ok(Vec::new())),
            metadata: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            delay_ms,
        }
    }

    fn set_listing(&self, ids: &[&str]) {
        *self.listing.lock().unwrap() = Ok(ids.iter().map(|id| id.to_string()).collect());
    }

    fn fail_listing(&self) {
        *self.listing.lock().unwrap() = Err("connection refused".to_string());
    }

    fn add_metadata(&self, theme_id: &str, version: &str) {
        self.metadata
            .lock()
            .unwrap()
            .insert(theme_id.to_string(), meta(theme_id, version));
    }
}

#[async_trait]
impl ThemeSource for MockSource {
    async fn list_theme_ids(&self) -> Result<Vec<String>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(current, Ordering::SeqCst);

        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        let listing = self.listing.lock().unwrap().clone();
        listing.map_err(AppError::Network)
    }

    async fn fetch_metadata(
        &self,
        theme_id: &str,
    ) -> Result<Option<RemoteThemeMetadata>, AppError> {
        Ok(self.metadata.lock().unwrap().get(theme_id).cloned())
    }
}

/// Publisher recording submitted change sets.
struct MockPublisher {
    fail: AtomicBool,
    submitted: Mutex<Vec<ChangeSet>>,
}

impl MockPublisher {
    fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn submitted(&self) -> Vec<ChangeSet> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ThemePublisher for MockPublisher {
    async fn submit(&self, change_set: &ChangeSet) -> Result<PullRequestRef, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Publish("simulated submission failure".to_string()));
        }

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(change_set.clone());
        Ok(PullRequestRef {
            number: submitted.len() as u64,
            url: format!("https://github.com/themehub/community-themes/pull/{}", submitted.len()),
        })
    }
}

/// In-memory asset store keyed by `bucket/key`.
struct MockAssetStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MockAssetStore {
    fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    fn put(&self, bucket: &str, key: &str, content: &str) {
        self.objects.lock().unwrap().insert(
            format!("{}/{}", bucket, key),
            Bytes::from(content.to_string()),
        );
    }
}

#[async_trait]
impl AssetStore for MockAssetStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, AppError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned())
    }
}

fn meta(theme_id: &str, version: &str) -> RemoteThemeMetadata {
    RemoteThemeMetadata {
        name: format!("Theme {}", theme_id),
        description: Some(format!("Description of {}", theme_id)),
        author: None,
        github: None,
        tags: Vec::new(),
        version: version.to_string(),
    }
}

fn new_job(theme_id: &str, action: JobAction) -> NewThemeJob {
    NewThemeJob {
        user_id: "user-1".to_string(),
        theme_id: theme_id.to_string(),
        name: format!("Theme {}", theme_id),
        description: Some(format!("Description of {}", theme_id)),
        version: "1.0.0".to_string(),
        action,
    }
}

/// Test fixture wiring jobs to a temp database and in-memory remotes.
struct TestFixture {
    themes: ThemeRepository,
    queue: JobQueueRepository,
    source: Arc<MockSource>,
    publisher: Arc<MockPublisher>,
    assets: Arc<MockAssetStore>,
    pool: sqlx::SqlitePool,
    config: Config,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let themes = ThemeRepository::new(pool.clone());
        let queue = JobQueueRepository::new(pool.clone());

        let config = Config {
            db_path,
            github_owner: "themehub".to_string(),
            github_repo: "community-themes".to_string(),
            github_branch: "main".to_string(),
            themes_path: "themes".to_string(),
            github_token: Some("test-token".to_string()),
            asset_endpoint: "http://127.0.0.1:9000".to_string(),
            asset_bucket: "theme-jobs".to_string(),
            sync_interval_secs: 1,
            drain_interval_secs: 1,
            request_timeout_secs: 5,
            log_level: "warn".to_string(),
        };

        TestFixture {
            themes,
            queue,
            source: Arc::new(MockSource::new()),
            publisher: Arc::new(MockPublisher::new()),
            assets: Arc::new(MockAssetStore::new()),
            pool,
            config,
            _temp_dir: temp_dir,
        }
    }

    fn sync_job(&self) -> SyncJob {
        SyncJob::new(
            Arc::clone(&self.source) as Arc<dyn ThemeSource>,
            self.themes.clone(),
            self.queue.clone(),
        )
    }

    fn drain_job(&self) -> DrainJob {
        DrainJob::new(
            &self.config,
            self.queue.clone(),
            self.themes.clone(),
            Arc::clone(&self.assets) as Arc<dyn AssetStore>,
            Arc::clone(&self.publisher) as Arc<dyn ThemePublisher>,
        )
    }

    /// Upload the full asset set for a theme.
    fn upload_assets(&self, theme_id: &str) {
        for file_name in ["styles.json", "styles.css", "settings.json"] {
            self.assets.put(
                &self.config.asset_bucket,
                &format!("{}/{}", theme_id, file_name),
                &format!("content of {}/{}", theme_id, file_name),
            );
        }
    }
}

// ==================== SYNC PATH ====================

#[tokio::test]
async fn test_sync_creates_missing_themes() {
    let fixture = TestFixture::new().await;
    fixture.source.set_listing(&["alpha", "beta"]);
    fixture.source.add_metadata("alpha", "1.0.0");
    fixture.source.add_metadata("beta", "2.3.0");

    let outcome = fixture.sync_job().run().await.unwrap();
    assert_eq!(outcome.created, 2);
    assert_eq!(outcome.deleted, 0);
    assert_eq!(outcome.skipped, 0);

    let alpha = fixture.themes.get_theme("alpha").await.unwrap().unwrap();
    assert_eq!(alpha.name, "Theme alpha");
    assert_eq!(alpha.favorites_count, 0);
    assert!(alpha.user_id.is_none());

    let versions = fixture.themes.list_versions("beta").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, "2.3.0");
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let fixture = TestFixture::new().await;
    fixture.source.set_listing(&["alpha", "beta"]);
    fixture.source.add_metadata("alpha", "1.0.0");
    fixture.source.add_metadata("beta", "1.0.0");

    let first = fixture.sync_job().run().await.unwrap();
    assert_eq!(first.created, 2);

    // Unchanged remote: the second pass makes zero mutations
    let second = fixture.sync_job().run().await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.skipped, 0);

    assert_eq!(fixture.themes.list_theme_ids().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_sync_protects_queued_themes() {
    let fixture = TestFixture::new().await;

    // Seed local catalog with {a, b}
    fixture.source.set_listing(&["a", "b"]);
    fixture.source.add_metadata("a", "1.0.0");
    fixture.source.add_metadata("b", "1.0.0");
    fixture.sync_job().run().await.unwrap();

    // "a" disappears from the remote but has a pending job; "c" is new
    fixture.queue.enqueue(&new_job("a", JobAction::Create)).await.unwrap();
    fixture.source.set_listing(&["b", "c"]);
    fixture.source.add_metadata("c", "1.0.0");

    let outcome = fixture.sync_job().run().await.unwrap();
    assert_eq!(outcome.deleted, 0);
    assert_eq!(outcome.created, 1);

    assert!(fixture.themes.get_theme("a").await.unwrap().is_some());
    assert!(fixture.themes.get_theme("b").await.unwrap().is_some());
    assert!(fixture.themes.get_theme("c").await.unwrap().is_some());
}

#[tokio::test]
async fn test_sync_deletes_unlisted_themes() {
    let fixture = TestFixture::new().await;
    fixture.source.set_listing(&["a", "b"]);
    fixture.source.add_metadata("a", "1.0.0");
    fixture.source.add_metadata("b", "1.0.0");
    fixture.sync_job().run().await.unwrap();

    fixture.source.set_listing(&["b"]);
    let outcome = fixture.sync_job().run().await.unwrap();
    assert_eq!(outcome.deleted, 1);

    assert!(fixture.themes.get_theme("a").await.unwrap().is_none());
    assert!(fixture.themes.get_theme("b").await.unwrap().is_some());

    // Version rows follow the theme via cascade
    assert!(fixture.themes.list_versions("a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_listing_failure_makes_no_changes() {
    let fixture = TestFixture::new().await;
    fixture.source.set_listing(&["a", "b"]);
    fixture.source.add_metadata("a", "1.0.0");
    fixture.source.add_metadata("b", "1.0.0");
    fixture.sync_job().run().await.unwrap();

    // A transport failure must not read as "zero remote themes"
    fixture.source.fail_listing();
    let result = fixture.sync_job().run().await;
    assert!(result.is_err());

    assert_eq!(fixture.themes.list_theme_ids().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_sync_partial_metadata_failure_isolated() {
    let fixture = TestFixture::new().await;
    fixture.source.set_listing(&["x", "y"]);
    // meta.json only exists for "y"
    fixture.source.add_metadata("y", "1.0.0");

    let outcome = fixture.sync_job().run().await.unwrap();
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.skipped, 1);

    assert!(fixture.themes.get_theme("x").await.unwrap().is_none());
    assert!(fixture.themes.get_theme("y").await.unwrap().is_some());

    // Once the metadata appears, the next pass picks "x" up
    fixture.source.add_metadata("x", "1.1.0");
    let retry = fixture.sync_job().run().await.unwrap();
    assert_eq!(retry.created, 1);
    assert!(fixture.themes.get_theme("x").await.unwrap().is_some());
}

#[tokio::test]
async fn test_create_theme_rolls_back_on_version_failure() {
    let fixture = TestFixture::new().await;

    // Sabotage the version insert: the paired theme insert must roll back
    sqlx::query("DROP TABLE theme_versions")
        .execute(&fixture.pool)
        .await
        .unwrap();

    let result = fixture
        .themes
        .create_theme_with_version("omega", &meta("omega", "1.0.0"))
        .await;
    assert!(result.is_err());

    assert!(fixture.themes.get_theme("omega").await.unwrap().is_none());
}

// ==================== PUBLISH PATH ====================

#[tokio::test]
async fn test_drain_consumes_entries_and_applies_catalog() {
    let fixture = TestFixture::new().await;
    fixture.upload_assets("gamma");
    fixture.queue.enqueue(&new_job("gamma", JobAction::Create)).await.unwrap();

    let outcome = fixture.drain_job().run().await.unwrap();
    assert_eq!(outcome.consumed, 1);
    assert_eq!(outcome.skipped, 0);
    assert!(outcome.pull_request.is_some());

    // One change set: three uploaded assets plus the generated meta.json
    let submitted = fixture.publisher.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].additions.len(), 4);
    assert!(submitted[0].removals.is_empty());

    let meta_file = submitted[0]
        .additions
        .iter()
        .find(|addition| addition.path == "themes/gamma/meta.json")
        .expect("meta.json staged");
    let parsed: RemoteThemeMetadata = serde_json::from_slice(&meta_file.content).unwrap();
    assert_eq!(parsed.version, "1.0.0");
    assert_eq!(parsed.author.as_deref(), Some("user-1"));

    // Catalog reflects the completed publish job
    let theme = fixture.themes.get_theme("gamma").await.unwrap().unwrap();
    assert_eq!(theme.user_id.as_deref(), Some("user-1"));
    assert_eq!(fixture.themes.list_versions("gamma").await.unwrap().len(), 1);

    // Queue is empty
    assert!(fixture.queue.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_drain_dedup_last_writer_wins() {
    let fixture = TestFixture::new().await;
    fixture.upload_assets("alpha");

    // CREATE first, DELETE later for the same theme: only the DELETE acts
    fixture.queue.enqueue(&new_job("alpha", JobAction::Create)).await.unwrap();
    fixture.queue.enqueue(&new_job("alpha", JobAction::Delete)).await.unwrap();

    let outcome = fixture.drain_job().run().await.unwrap();
    assert_eq!(outcome.consumed, 1);

    let submitted = fixture.publisher.submitted();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].additions.is_empty());
    assert_eq!(submitted[0].removals, vec!["themes/alpha".to_string()]);

    assert!(fixture.queue.pending().await.unwrap().is_empty());
    assert!(fixture.themes.get_theme("alpha").await.unwrap().is_none());

    // The superseded CREATE is gone too: a later tick must not resurrect
    // the theme from its leftover row (the assets are still uploaded).
    let again = fixture.drain_job().run().await.unwrap();
    assert_eq!(again.consumed, 0);
    assert!(fixture.publisher.submitted().len() == 1);
    assert!(fixture.themes.get_theme("alpha").await.unwrap().is_none());
}

#[tokio::test]
async fn test_drain_failure_leaves_queue_untouched() {
    let fixture = TestFixture::new().await;
    fixture.upload_assets("delta");
    fixture.queue.enqueue(&new_job("delta", JobAction::Create)).await.unwrap();
    fixture.publisher.fail.store(true, Ordering::SeqCst);

    let result = fixture.drain_job().run().await;
    assert!(result.is_err());

    // At-least-once: the entry stays queued and nothing reached the catalog
    assert_eq!(fixture.queue.pending().await.unwrap().len(), 1);
    assert!(fixture.themes.get_theme("delta").await.unwrap().is_none());
}

#[tokio::test]
async fn test_drain_skips_create_without_assets() {
    let fixture = TestFixture::new().await;
    fixture.queue.enqueue(&new_job("nofiles", JobAction::Create)).await.unwrap();

    let outcome = fixture.drain_job().run().await.unwrap();
    assert_eq!(outcome.consumed, 0);
    assert_eq!(outcome.skipped, 1);
    assert!(outcome.pull_request.is_none());

    // Nothing submitted, entry left queued for the next tick
    assert!(fixture.publisher.submitted().is_empty());
    assert_eq!(fixture.queue.pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_drain_empty_queue_is_a_noop() {
    let fixture = TestFixture::new().await;

    let outcome = fixture.drain_job().run().await.unwrap();
    assert_eq!(outcome.consumed, 0);
    assert_eq!(outcome.skipped, 0);
    assert!(fixture.publisher.submitted().is_empty());
}

#[tokio::test]
async fn test_republish_bumps_version() {
    let fixture = TestFixture::new().await;
    fixture.upload_assets("epsilon");
    fixture.queue.enqueue(&new_job("epsilon", JobAction::Create)).await.unwrap();
    fixture.drain_job().run().await.unwrap();

    // Publish again with a newer version
    let mut bump = new_job("epsilon", JobAction::Create);
    bump.version = "2.0.0".to_string();
    fixture.queue.enqueue(&bump).await.unwrap();
    fixture.drain_job().run().await.unwrap();

    let versions = fixture.themes.list_versions("epsilon").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(fixture.themes.list_theme_ids().await.unwrap().len(), 1);
}

// ==================== SCHEDULER ====================

#[tokio::test]
async fn test_scheduler_never_overlaps_sync_runs() {
    let fixture = TestFixture::new().await;

    // Each run takes 1.5x the schedule period
    let slow_source = Arc::new(MockSource::with_delay(1500));
    slow_source.set_listing(&[]);

    let sync_job = Arc::new(SyncJob::new(
        Arc::clone(&slow_source) as Arc<dyn ThemeSource>,
        fixture.themes.clone(),
        fixture.queue.clone(),
    ));

    let scheduler = Scheduler::new(sync_job, None, &fixture.config);
    let handles = scheduler.start();

    tokio::time::sleep(Duration::from_millis(3200)).await;
    scheduler.stop();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(slow_source.calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(slow_source.max_concurrent.load(Ordering::SeqCst), 1);
}
