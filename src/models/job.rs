//! Theme job queue models.

use serde::{Deserialize, Serialize};

/// Action requested by a queued theme job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobAction {
    Create,
    Delete,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::Create => "CREATE",
            JobAction::Delete => "DELETE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(JobAction::Create),
            "DELETE" => Some(JobAction::Delete),
            _ => None,
        }
    }
}

/// A pending publish/unpublish request not yet reflected in the themes table.
///
/// Produced by the publish endpoints, consumed by the queue drainer. While an
/// entry exists for a theme id, that id is in flight and the reconciler must
/// not delete it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeJobQueueEntry {
    pub id: String,
    /// User who requested the change
    pub user_id: String,
    pub theme_id: String,
    /// Copied into the theme row and the generated meta.json
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version string recorded with the publish request
    pub version: String,
    pub action: JobAction,
    pub created_at: String,
}

/// Fields supplied when enqueuing a new theme job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThemeJob {
    pub user_id: String,
    pub theme_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub action: JobAction,
}
