//! Object storage collaborator
//!
//! Staged inputs live in an S3-compatible object store addressed by URL.
//! The trait is the seam tests substitute; the production implementation
//! PUTs to a configured base URL and does not sign requests (bucket
//! policy or a fronting gateway handles auth).

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Staged object handle
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub url: String,
}

/// Upload failure modes
#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("upload timed out: {0}")]
    Timeout(String),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// Durable object storage for staged inputs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a payload under `folder` with a generated object name.
    /// Distinct uploads never collide: the object name embeds a UUID.
    async fn upload(
        &self,
        bytes: &[u8],
        folder: &str,
        extension: &str,
        content_type: &str,
    ) -> std::result::Result<StoredObject, StorageError>;
}

/// HTTP PUT object store for S3-compatible endpoints
pub struct HttpObjectStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build storage client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        bytes: &[u8],
        folder: &str,
        extension: &str,
        content_type: &str,
    ) -> std::result::Result<StoredObject, StorageError> {
        let url = format!("{}/{}/{}.{}", self.base_url, folder, Uuid::new_v4(), extension);

        tracing::debug!(url = %url, size_bytes = bytes.len(), "Uploading staged input");

        let response = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Timeout(e.to_string())
                } else {
                    StorageError::Upload(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Upload(format!(
                "storage returned {status} for {url}"
            )));
        }

        tracing::info!(url = %url, size_bytes = bytes.len(), "Staged input uploaded");

        Ok(StoredObject { url })
    }
}
