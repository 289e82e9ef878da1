//! Multimodal inference backends.
//!
//! The pipeline only sees [`VisionProvider`]. Providers never retry and never
//! panic on backend trouble; every failure comes back as a [`Failure`] with a
//! provider code that the pipeline passes through untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, Failure, Outcome};
use crate::image::Image;
use crate::text::strip_code_fence;

pub mod http;

pub use http::HttpVisionProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lighting {
    Good,
    Dim,
    Dark,
    Glare,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Coarse summary of what is in front of the camera.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Signals {
    pub has_text: bool,
    pub hazards: Vec<String>,
    pub people_count: u32,
    pub lighting: Lighting,
    /// 0.0 to 1.0
    pub confidence: f32,
}

impl Signals {
    /// Parses the JSON the backend produced for an inspection prompt.
    pub fn parse(raw: &str) -> Outcome<Self> {
        let mut signals: Signals = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
            Failure::new(
                ErrorCode::MalformedResponse,
                "The vision backend returned an unreadable analysis.",
            )
            .with_details(e)
        })?;
        signals.confidence = if signals.confidence.is_finite() {
            signals.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        signals.hazards.retain(|h| !h.trim().is_empty());
        Ok(signals)
    }
}

#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Extracts [`Signals`] from an image.
    async fn inspect_image(&self, image: &Image) -> Outcome<Signals>;

    /// Answers `prompt` about `image` with free-form text.
    async fn generate_response(&self, image: &Image, prompt: &str) -> Outcome<String>;
}
