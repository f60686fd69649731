use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;

use ripple_types::error::CoreError;
use ripple_types::models::MediaKind;

/// Seam to the external media service. The coordinator resolves uploads
/// through this trait before any message row is written, so a failed upload
/// aborts the send with nothing persisted.
pub trait MediaStore: Send + Sync {
    fn upload(&self, bytes: Vec<u8>, kind: MediaKind) -> BoxFuture<'_, Result<String, CoreError>>;
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

/// Uploads media by POSTing the raw bytes to the configured media service
/// and returning the URL it answers with.
pub struct HttpMediaStore {
    client: Client,
    base_url: String,
}

impl HttpMediaStore {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

impl MediaStore for HttpMediaStore {
    fn upload(&self, bytes: Vec<u8>, kind: MediaKind) -> BoxFuture<'_, Result<String, CoreError>> {
        Box::pin(async move {
            let resp = self
                .client
                .post(format!("{}/media/{}", self.base_url, kind.as_str()))
                .header("Content-Type", "application/octet-stream")
                .body(bytes)
                .send()
                .await
                .map_err(|e| CoreError::Upload(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(CoreError::Upload(format!(
                    "media service returned {}",
                    resp.status()
                )));
            }

            let parsed: UploadResponse = resp
                .json()
                .await
                .map_err(|e| CoreError::Upload(e.to_string()))?;

            Ok(parsed.url)
        })
    }
}

/// Stands in when no media service is configured: text messaging works,
/// anything carrying media fails the whole send.
pub struct DisabledMediaStore;

impl MediaStore for DisabledMediaStore {
    fn upload(&self, _bytes: Vec<u8>, _kind: MediaKind) -> BoxFuture<'_, Result<String, CoreError>> {
        Box::pin(async { Err(CoreError::Upload("no media service configured".into())) })
    }
}
