use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{Signals, VisionProvider};
use crate::error::{ErrorCode, Failure, Outcome};
use crate::image::Image;
use crate::prompt::INSPECTION_PROMPT;

const IMAGE_SLOT: u32 = 10;
const INSPECT_TOKENS: usize = 160;
const GENERATE_TOKENS: usize = 384;

/// Multimodal backend speaking the llama.cpp server `/completion` protocol.
#[derive(Clone)]
pub struct HttpVisionProvider {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CompletionRequest {
    prompt: String,
    image_data: Vec<ImageData>,
    stream: bool,
    n_predict: usize,
    temperature: f32,
    stop: Vec<&'static str>,
}

#[derive(Serialize)]
struct ImageData {
    data: String,
    id: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

impl HttpVisionProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn complete(
        &self,
        image: &Image,
        prompt: &str,
        n_predict: usize,
        temperature: f32,
    ) -> Outcome<String> {
        let body = CompletionRequest {
            prompt: format!("USER:[img-{IMAGE_SLOT}]{prompt}\nASSISTANT:"),
            image_data: vec![ImageData {
                data: STANDARD.encode(image.bytes()),
                id: IMAGE_SLOT,
            }],
            stream: false,
            n_predict,
            temperature,
            stop: vec!["USER:"],
        };

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Failure::new(
                ErrorCode::ProviderError,
                "The vision backend could not process the image.",
            )
            .with_details(format!("backend returned {status}")));
        }

        let parsed: CompletionResponse = response.json().await.map_err(transport_failure)?;
        debug!(chars = parsed.content.len(), "Backend completion received");
        Ok(parsed.content.trim().to_string())
    }
}

fn transport_failure(e: reqwest::Error) -> Failure {
    if e.is_timeout() {
        Failure::new(
            ErrorCode::ProviderTimeout,
            "The vision backend took too long to respond.",
        )
        .with_details(e)
    } else if e.is_decode() {
        Failure::new(
            ErrorCode::MalformedResponse,
            "The vision backend returned an unreadable response.",
        )
        .with_details(e)
    } else {
        Failure::new(ErrorCode::ProviderError, "The vision backend is unreachable.").with_details(e)
    }
}

#[async_trait]
impl VisionProvider for HttpVisionProvider {
    async fn inspect_image(&self, image: &Image) -> Outcome<Signals> {
        let raw = self
            .complete(image, INSPECTION_PROMPT, INSPECT_TOKENS, 0.0)
            .await?;
        Signals::parse(&raw)
    }

    async fn generate_response(&self, image: &Image, prompt: &str) -> Outcome<String> {
        self.complete(image, prompt, GENERATE_TOKENS, 0.4).await
    }
}
