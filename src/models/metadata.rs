//! Remote theme metadata model.

use serde::{Deserialize, Serialize};

/// Contents of a theme's `meta.json` in the remote repository.
///
/// Transient: read at creation time to populate the theme and version rows,
/// never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteThemeMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub version: String,
}
