//! Short-lived image cache keyed by opaque tokens.
//!
//! A token is a handoff: the client uploads once, then follow-up requests in
//! the same session reference the image by token for a few minutes. Every
//! backend honours the same rules:
//!
//! - `save` always mints a fresh token, even for identical bytes.
//! - `get` treats an expired entry as absent before the sweeper removes it.
//! - `sweep` removes expired entries only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Outcome;
use crate::image::Image;

pub mod blob;
pub mod memory;
pub mod sweeper;

pub use blob::BlobImageStore;
pub use memory::{MemoryImageStore, SharedImageStore};
pub use sweeper::spawn_sweeper;

/// Opaque key returned by [`ImageStore::save`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageToken(String);

impl ImageToken {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ImageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `image` for `ttl` and returns its token.
    async fn save(&self, image: Image, ttl: Duration) -> Outcome<ImageToken>;

    /// Returns the image while its entry is live. Unknown or expired tokens
    /// are `Ok(None)`; only backend failures are errors.
    async fn get(&self, token: &str) -> Outcome<Option<Image>>;

    /// Physically drops expired entries and reports how many went.
    async fn sweep(&self) -> Outcome<usize>;
}

pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}
