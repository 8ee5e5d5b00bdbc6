//! Archive readers for a local directory or path-style HTTP object URLs.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::MessageStore;
use crate::error::TransportError;

/// Reads `<root>/<bucket>/<key>` from the local filesystem.
#[derive(Debug, Clone)]
pub struct FsMessageStore {
    root: PathBuf,
}

impl FsMessageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, TransportError> {
        // Keys come from upstream events; never let one climb out of the archive.
        if key.split('/').any(|part| part == "..") || bucket.contains('/') {
            return Err(TransportError::Other(format!(
                "invalid object location {bucket}/{key}"
            )));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl MessageStore for FsMessageStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, TransportError> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), "Reading archived message");
        Ok(tokio::fs::read(&path).await?)
    }
}

/// Fetches `<base>/<bucket>/<key>` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMessageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.base_url)
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.object_url(bucket, key);
        debug!(url = %url, "Fetching archived message");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TransportError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(body.to_vec())
    }
}
