use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

use super::{ttl_millis, ImageStore, ImageToken};
use crate::clock::Clock;
use crate::error::Outcome;
use crate::image::Image;

#[derive(Debug, Clone)]
struct CacheEntry {
    image: Image,
    expires_at: u64,
}

impl CacheEntry {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// Image cache held in this process's memory.
///
/// Entries are inserted whole under the write lock, so readers and the
/// sweeper only ever see complete entries.
pub struct MemoryImageStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryImageStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Entries currently held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, image: Image, ttl: Duration) -> ImageToken {
        let entry = CacheEntry {
            image,
            expires_at: self.clock.now().saturating_add(ttl_millis(ttl)),
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut token = ImageToken::generate();
        while entries.contains_key(token.as_str()) {
            token = ImageToken::generate();
        }
        entries.insert(token.as_str().to_string(), entry);
        token
    }

    fn lookup(&self, token: &str) -> Option<Image> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(token)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.image.clone())
    }

    fn remove_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn save(&self, image: Image, ttl: Duration) -> Outcome<ImageToken> {
        let size = image.len();
        let token = self.insert(image, ttl);
        debug!(token = %token, size, ttl_ms = ttl_millis(ttl), "Image cached");
        Ok(token)
    }

    async fn get(&self, token: &str) -> Outcome<Option<Image>> {
        Ok(self.lookup(token))
    }

    async fn sweep(&self) -> Outcome<usize> {
        Ok(self.remove_expired())
    }
}

/// Process-wide image cache handle.
///
/// Built once at startup and cloned into every handler that needs it; all
/// clones see the same entries.
#[derive(Clone)]
pub struct SharedImageStore {
    inner: Arc<MemoryImageStore>,
}

impl SharedImageStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(MemoryImageStore::new(clock)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ImageStore for SharedImageStore {
    async fn save(&self, image: Image, ttl: Duration) -> Outcome<ImageToken> {
        self.inner.save(image, ttl).await
    }

    async fn get(&self, token: &str) -> Outcome<Option<Image>> {
        self.inner.get(token).await
    }

    async fn sweep(&self) -> Outcome<usize> {
        self.inner.sweep().await
    }
}
