use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::pipeline::PipelineConfig;
use crate::server::DEFAULT_BODY_LIMIT;
use crate::store::{BlobImageStore, ImageStore, MemoryImageStore, SharedImageStore};
use crate::telemetry::recorder::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Private to the pipeline that owns it.
    Memory,
    /// One map for the whole process.
    Shared,
    /// Bytes in an external HTTP blob service.
    Blob,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "lumen", about = "Assistive-vision request service", version)]
pub struct Config {
    #[arg(long, env = "LUMEN_BIND", default_value = "0.0.0.0:8787")]
    pub bind: SocketAddr,

    /// Base URL of the multimodal completion backend.
    #[arg(long, env = "LUMEN_BACKEND_URL", default_value = "http://localhost:8080")]
    pub backend_url: String,

    #[arg(long, env = "LUMEN_PROVIDER_TIMEOUT_SECS", default_value_t = 30)]
    pub provider_timeout_secs: u64,

    #[arg(long, env = "LUMEN_STORE", value_enum, default_value_t = StoreKind::Shared)]
    pub store: StoreKind,

    /// Required when `--store blob`.
    #[arg(long, env = "LUMEN_BLOB_URL")]
    pub blob_url: Option<String>,

    #[arg(long, env = "LUMEN_BLOB_TIMEOUT_SECS", default_value_t = 5)]
    pub blob_timeout_secs: u64,

    #[arg(long, env = "LUMEN_IMAGE_TTL_MINUTES", default_value_t = 10)]
    pub image_ttl_minutes: u64,

    #[arg(long, env = "LUMEN_FOLLOW_UP_TTL_MINUTES", default_value_t = 5)]
    pub follow_up_ttl_minutes: u64,

    /// Do not mint follow-up tokens after successful requests.
    #[arg(long, env = "LUMEN_NO_FOLLOW_UP")]
    pub no_follow_up: bool,

    #[arg(long, env = "LUMEN_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    #[arg(long, env = "LUMEN_TELEMETRY_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub telemetry_capacity: usize,

    #[arg(long, env = "LUMEN_MAX_BODY_BYTES", default_value_t = DEFAULT_BODY_LIMIT)]
    pub max_body_bytes: usize,
}

impl Config {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            upload_ttl: minutes(self.image_ttl_minutes),
            follow_up_ttl: (!self.no_follow_up).then(|| minutes(self.follow_up_ttl_minutes)),
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn build_store(&self, clock: Arc<dyn Clock>) -> Result<Arc<dyn ImageStore>> {
        let store: Arc<dyn ImageStore> = match self.store {
            StoreKind::Memory => Arc::new(MemoryImageStore::new(clock)),
            StoreKind::Shared => Arc::new(SharedImageStore::new(clock)),
            StoreKind::Blob => {
                let Some(url) = self.blob_url.as_deref().filter(|u| !u.trim().is_empty()) else {
                    bail!("--store blob requires --blob-url (LUMEN_BLOB_URL)");
                };
                Arc::new(BlobImageStore::new(
                    url,
                    Duration::from_secs(self.blob_timeout_secs.max(1)),
                    clock,
                ))
            }
        };
        Ok(store)
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}
