//! Request orchestration.
//!
//! Each request walks three sequential checkpoints:
//!
//! 1. Resolve the image (inline, or by token through the store).
//! 2. Inspect it for signals (assist only).
//! 3. Generate the spoken answer.
//!
//! A failure at any checkpoint ends the request with that failure, unchanged.
//! Every exit path writes one telemetry record through [`span::RequestSpan`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{Failure, Outcome};
use crate::image::Image;
use crate::prompt::{assist_prompt, ocr_prompt, PromptContext};
use crate::provider::VisionProvider;
use crate::store::{ImageStore, ImageToken};
use crate::telemetry::{Mode, TelemetrySink};

pub mod request;
pub mod response;
mod span;

pub use request::{AssistRequest, ImageSource, OcrRequest};
pub use response::{parse_spoken_reply, AssistResponse, OcrResponse, Reply, SpokenReply, StoredImage};

use span::RequestSpan;

pub const ROUTE_ASSIST: &str = "/v1/assist";
pub const ROUTE_OCR: &str = "/v1/ocr";
pub const ROUTE_UPLOAD: &str = "/v1/images";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Lifetime of tokens minted by explicit uploads.
    pub upload_ttl: Duration,
    /// Lifetime of follow-up tokens; `None` disables them.
    pub follow_up_ttl: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_ttl: Duration::from_secs(10 * 60),
            follow_up_ttl: Some(Duration::from_secs(5 * 60)),
        }
    }
}

/// Dependency-injected request core. Cheap to share behind an `Arc`.
pub struct Pipeline {
    store: Arc<dyn ImageStore>,
    provider: Arc<dyn VisionProvider>,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ImageStore>,
        provider: Arc<dyn VisionProvider>,
        telemetry: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            provider,
            telemetry,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn span(
        &self,
        mode: Mode,
        route: &'static str,
        session_id: Option<String>,
        correlation_id: Option<String>,
    ) -> RequestSpan {
        RequestSpan::start(
            self.telemetry.clone(),
            self.clock.clone(),
            mode,
            route,
            session_id,
            correlation_id,
        )
    }

    /// Describes the scene, or answers the user's question about it.
    pub async fn assist(&self, request: AssistRequest) -> Reply<AssistResponse> {
        let mut span = self.span(
            Mode::Assist,
            ROUTE_ASSIST,
            request.session_id.clone(),
            request.correlation_id.clone(),
        );
        span.bytes_in = request.source.inline_len() as u64;

        let result = self.run_assist(request, &mut span).await;
        let timing = span.finish(result.as_ref().err().map(|f| f.code));
        Reply { result, timing }
    }

    async fn run_assist(
        &self,
        request: AssistRequest,
        span: &mut RequestSpan,
    ) -> Outcome<AssistResponse> {
        let image = self.resolve_image(&request.source).await?;
        span.bytes_in = image.len() as u64;
        span.begin_processing();

        let inspect_started = span.now();
        let inspected = self.provider.inspect_image(&image).await;
        span.set_inspection_since(inspect_started);
        let signals = inspected?;

        let prompt = assist_prompt(&PromptContext {
            language: &request.language,
            verbosity: request.verbosity,
            signals: &signals,
            question: request.question.as_deref(),
        });
        let raw = self.provider.generate_response(&image, &prompt).await?;
        let reply = parse_spoken_reply(&raw);
        span.end_processing();
        span.bytes_out = reply.byte_len() as u64;

        debug!(
            hazards = signals.hazards.len(),
            people = signals.people_count,
            details = reply.details.len(),
            "Assist answered"
        );

        let follow_up_token = self.mint_follow_up(image).await;
        Ok(AssistResponse {
            reply,
            signals,
            follow_up_token,
            session_id: request.session_id,
        })
    }

    /// Reads the text in the image aloud.
    pub async fn ocr(&self, request: OcrRequest) -> Reply<OcrResponse> {
        let mut span = self.span(
            Mode::Ocr,
            ROUTE_OCR,
            request.session_id.clone(),
            request.correlation_id.clone(),
        );
        span.bytes_in = request.source.inline_len() as u64;

        let result = self.run_ocr(request, &mut span).await;
        let timing = span.finish(result.as_ref().err().map(|f| f.code));
        Reply { result, timing }
    }

    async fn run_ocr(&self, request: OcrRequest, span: &mut RequestSpan) -> Outcome<OcrResponse> {
        let image = self.resolve_image(&request.source).await?;
        span.bytes_in = image.len() as u64;
        span.begin_processing();

        let raw = self
            .provider
            .generate_response(&image, &ocr_prompt(&request.language))
            .await?;
        let reply = parse_spoken_reply(&raw);
        span.end_processing();
        span.bytes_out = reply.byte_len() as u64;

        let follow_up_token = self.mint_follow_up(image).await;
        Ok(OcrResponse {
            reply,
            follow_up_token,
            session_id: request.session_id,
        })
    }

    /// Caches an upload so later requests can reference it by token.
    pub async fn store_image(&self, source: ImageSource) -> Reply<StoredImage> {
        let mut span = self.span(Mode::Upload, ROUTE_UPLOAD, None, None);
        span.bytes_in = source.inline_len() as u64;

        let result = match source {
            ImageSource::Inline(image) if !image.is_empty() => {
                let ttl = self.config.upload_ttl;
                self.store.save(image, ttl).await.map(|token| StoredImage {
                    token,
                    expires_in_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
                })
            }
            ImageSource::Undecodable(reason) => Err(Failure::invalid_image().with_details(reason)),
            _ => Err(Failure::invalid_image()),
        };

        let timing = span.finish(result.as_ref().err().map(|f| f.code));
        Reply { result, timing }
    }

    /// Records a request that never reached checkpoint 1 because its body
    /// could not be read, and returns the failure envelope for it.
    pub fn reject<T>(
        &self,
        mode: Mode,
        failure: Failure,
        correlation_id: Option<String>,
    ) -> Reply<T> {
        let route = match mode {
            Mode::Assist => ROUTE_ASSIST,
            Mode::Ocr => ROUTE_OCR,
            Mode::Upload => ROUTE_UPLOAD,
        };
        let span = self.span(mode, route, None, correlation_id);
        debug!(mode = %mode, err_code = %failure.code, "Request body rejected");
        let timing = span.finish(Some(failure.code));
        Reply {
            result: Err(failure),
            timing,
        }
    }

    /// Checkpoint 1. Runs before any provider call.
    async fn resolve_image(&self, source: &ImageSource) -> Outcome<Image> {
        match source {
            ImageSource::Inline(image) if !image.is_empty() => Ok(image.clone()),
            ImageSource::Inline(_) | ImageSource::Missing => Err(Failure::invalid_image()),
            ImageSource::Undecodable(reason) => {
                Err(Failure::invalid_image().with_details(reason))
            }
            ImageSource::Token(token) => match self.store.get(token).await? {
                Some(image) => Ok(image),
                None => {
                    debug!(token = %token, "Image token missing or expired");
                    Err(Failure::image_not_found())
                }
            },
        }
    }

    async fn mint_follow_up(&self, image: Image) -> Option<ImageToken> {
        let ttl = self.config.follow_up_ttl?;
        match self.store.save(image, ttl).await {
            Ok(token) => Some(token),
            Err(failure) => {
                warn!(err_code = %failure.code, "Could not mint follow-up token: {}", failure.message);
                None
            }
        }
    }
}
