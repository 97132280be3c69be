//! Theme repository for catalog reads and sync-path writes.
//!
//! The sync and drain jobs have exclusive write access to the themes and
//! theme_versions tables; every theme creation pairs a version row with the
//! theme row inside one transaction.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{RemoteThemeMetadata, Theme, ThemeJobQueueEntry, ThemeVersion};

/// Repository for themes and their versions.
#[derive(Clone)]
pub struct ThemeRepository {
    pool: SqlitePool,
}

impl ThemeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List the ids of all themes currently in the catalog.
    pub async fn list_theme_ids(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT id FROM themes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    /// Get a theme by ID.
    pub async fn get_theme(&self, id: &str) -> Result<Option<Theme>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, favorites_count, created_at, updated_at, user_id FROM themes WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(theme_from_row))
    }

    /// List the published versions of a theme, oldest first.
    pub async fn list_versions(&self, theme_id: &str) -> Result<Vec<ThemeVersion>, AppError> {
        let rows = sqlx::query(
            "SELECT id, theme_id, version, created_at FROM theme_versions WHERE theme_id = ? ORDER BY created_at"
        )
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ThemeVersion {
                id: row.get("id"),
                theme_id: row.get("theme_id"),
                version: row.get("version"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Create a theme discovered on the remote, together with its version row.
    ///
    /// Runs in a single transaction so a failed version insert leaves no
    /// orphaned theme row behind. Failures are isolated to this one theme.
    pub async fn create_theme_with_version(
        &self,
        id: &str,
        metadata: &RemoteThemeMetadata,
    ) -> Result<Theme, AppError> {
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO themes (id, name, description, favorites_count, created_at, updated_at, user_id) VALUES (?, ?, ?, 0, ?, ?, NULL)"
        )
        .bind(id)
        .bind(&metadata.name)
        .bind(&metadata.description)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO theme_versions (id, theme_id, version, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(id)
        .bind(&metadata.version)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Theme {
            id: id.to_string(),
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            favorites_count: 0,
            created_at: now.clone(),
            updated_at: now,
            user_id: None,
        })
    }

    /// Bulk-delete themes by id set with a single statement.
    ///
    /// Version rows follow via foreign-key cascade. Returns the number of
    /// deleted themes.
    pub async fn delete_themes(&self, ids: &[String]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM themes WHERE id IN ({})", placeholders);

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Apply a consumed CREATE job: upsert the theme row and append a version.
    ///
    /// Re-publishing an existing theme is a version bump, so conflicts on the
    /// id update name/description instead of failing.
    pub async fn apply_publish(&self, entry: &ThemeJobQueueEntry) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO themes (id, name, description, favorites_count, created_at, updated_at, user_id)
               VALUES (?, ?, ?, 0, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   description = excluded.description,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&entry.theme_id)
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(&now)
        .bind(&now)
        .bind(&entry.user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO theme_versions (id, theme_id, version, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.theme_id)
        .bind(&entry.version)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Apply a consumed DELETE job: remove the theme row if it exists.
    pub async fn apply_unpublish(&self, theme_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM themes WHERE id = ?")
            .bind(theme_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn theme_from_row(row: &sqlx::sqlite::SqliteRow) -> Theme {
    Theme {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        favorites_count: row.get("favorites_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        user_id: row.get("user_id"),
    }
}
