//! Theme and theme version models.

use serde::{Deserialize, Serialize};

/// A marketplace theme mirrored from the themes repository.
///
/// The id equals the theme's directory name in the remote repository
/// (e.g. `minimal_midnight`) and is stable across syncs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    /// Human-readable name, not necessarily unique
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Mutated only by the favoriting endpoints, never by the sync path
    pub favorites_count: i64,
    pub created_at: String,
    pub updated_at: String,
    /// Empty for themes contributed directly to the repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// A published version of a theme.
///
/// Append-only: version rows are never updated or deleted by the sync path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeVersion {
    pub id: String,
    pub theme_id: String,
    pub version: String,
    pub created_at: String,
}
