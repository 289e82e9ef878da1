use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ttl_millis, ImageStore, ImageToken};
use crate::clock::Clock;
use crate::error::{ErrorCode, Failure, Outcome};
use crate::image::Image;

#[derive(Debug, Clone)]
struct BlobEntry {
    mime_type: String,
    expires_at: u64,
}

/// Image cache whose bytes live in an external HTTP blob service.
///
/// Objects are written with `PUT {base}/{token}`, read with `GET` and removed
/// with `DELETE`. Expiry is tracked in a local index: a token only becomes
/// visible once its upload has completed, so the sweeper can never delete an
/// object that is still being written.
pub struct BlobImageStore {
    client: Client,
    base_url: String,
    timeout: Duration,
    index: RwLock<HashMap<String, BlobEntry>>,
    clock: Arc<dyn Clock>,
}

impl BlobImageStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            index: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn object_url(&self, token: &str) -> String {
        format!("{}/{}", self.base_url, token)
    }

    /// Runs one blob round-trip under the configured deadline.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Outcome<T>
    where
        F: Future<Output = Result<T, reqwest::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_timeout() => Err(storage_timeout(op)),
            Ok(Err(e)) => Err(Failure::new(
                ErrorCode::StorageError,
                "Image storage is unavailable.",
            )
            .with_details(format!("{op}: {e}"))),
            Err(_) => Err(storage_timeout(op)),
        }
    }

    /// A token not already present in the index.
    fn fresh_token(&self) -> ImageToken {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut token = ImageToken::generate();
        while index.contains_key(token.as_str()) {
            token = ImageToken::generate();
        }
        token
    }

    /// Best-effort remote delete. Failures are logged, never returned.
    async fn discard(&self, token: &str) {
        let url = self.object_url(token);
        let result = self
            .bounded("delete", async { self.client.delete(&url).send().await })
            .await;
        match result {
            Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND => {}
            Ok(resp) => warn!(token = %token, status = %resp.status(), "Blob delete rejected"),
            Err(failure) => warn!(token = %token, err_code = %failure.code, "Blob delete failed"),
        }
    }

    fn live_entry(&self, token: &str) -> Option<BlobEntry> {
        let now = self.clock.now();
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.get(token).filter(|e| now < e.expires_at).cloned()
    }
}

fn storage_timeout(op: &str) -> Failure {
    Failure::new(ErrorCode::StorageTimeout, "Image storage did not respond in time.")
        .with_details(format!("{op} timed out"))
}

fn unexpected_status(op: &str, status: StatusCode) -> Failure {
    Failure::new(ErrorCode::StorageError, "Image storage is unavailable.")
        .with_details(format!("{op} returned {status}"))
}

#[async_trait]
impl ImageStore for BlobImageStore {
    async fn save(&self, image: Image, ttl: Duration) -> Outcome<ImageToken> {
        let token = self.fresh_token();
        let url = self.object_url(token.as_str());

        let uploaded = self
            .bounded("put", async {
                let resp = self
                    .client
                    .put(&url)
                    .header(reqwest::header::CONTENT_TYPE, image.mime_type())
                    .body(image.bytes().to_vec())
                    .send()
                    .await?;
                Ok::<_, reqwest::Error>(resp.status())
            })
            .await
            .and_then(|status| {
                if status.is_success() {
                    Ok(())
                } else {
                    Err(unexpected_status("put", status))
                }
            });

        // The backend may have written the object before failing; it is
        // not indexed, so sweep would never reach it.
        if let Err(failure) = uploaded {
            self.discard(token.as_str()).await;
            return Err(failure);
        }

        let entry = BlobEntry {
            mime_type: image.mime_type().to_string(),
            expires_at: self.clock.now().saturating_add(ttl_millis(ttl)),
        };
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.as_str().to_string(), entry);

        debug!(token = %token, size = image.len(), "Image uploaded to blob storage");
        Ok(token)
    }

    async fn get(&self, token: &str) -> Outcome<Option<Image>> {
        let Some(entry) = self.live_entry(token) else {
            return Ok(None);
        };
        let url = self.object_url(token);

        let fetched = self
            .bounded("get", async {
                let resp = self.client.get(&url).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Ok::<_, reqwest::Error>((status, None));
                }
                let bytes = resp.bytes().await?;
                Ok::<_, reqwest::Error>((status, Some(bytes)))
            })
            .await?;

        // The entry may have expired while the GET was in flight.
        if self.clock.now() >= entry.expires_at {
            return Ok(None);
        }

        match fetched {
            (_, Some(bytes)) => Ok(Some(Image::new(bytes.to_vec(), entry.mime_type))),
            (StatusCode::NOT_FOUND, None) => Ok(None),
            (status, None) => Err(unexpected_status("get", status)),
        }
    }

    async fn sweep(&self) -> Outcome<usize> {
        let now = self.clock.now();
        let expired: Vec<String> = {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
            let tokens: Vec<String> = index
                .iter()
                .filter(|(_, e)| now >= e.expires_at)
                .map(|(t, _)| t.clone())
                .collect();
            for token in &tokens {
                index.remove(token);
            }
            tokens
        };

        // Index entries are already gone; remote deletes are best effort.
        for token in &expired {
            self.discard(token).await;
        }

        Ok(expired.len())
    }
}
