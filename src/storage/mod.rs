//! Asset store client.
//!
//! Uploaded theme files sit in an object store bucket under keys prefixed by
//! theme id; the drain job reads them back when staging a publish. Bucket
//! provisioning belongs to the upload side and is not handled here.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::errors::AppError;

/// Blob storage contract consumed by the drain job.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch one object; None if it does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, AppError>;
}

/// Asset store client over plain HTTP path addressing
/// (`{endpoint}/{bucket}/{key}`, as served by MinIO-compatible stores).
pub struct HttpAssetStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAssetStore {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.asset_endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, AppError> {
        let url = format!("{}/{}/{}", self.endpoint, bucket, key);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "Fetching {}/{} returned status {}",
                bucket,
                key,
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        debug!("Fetched {} bytes for object {}/{}", bytes.len(), bucket, key);
        Ok(Some(bytes))
    }
}
