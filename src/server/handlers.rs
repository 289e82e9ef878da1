use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{status_for, AppState};
use crate::error::{ErrorCode, Failure};
use crate::image::Image;
use crate::pipeline::{AssistRequest, ImageSource, OcrRequest, Reply};
use crate::prompt::{Verbosity, DEFAULT_LANGUAGE};
use crate::telemetry::Mode;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Default, Deserialize)]
pub struct AssistBody {
    /// Base64 or a `data:` URL.
    pub image: Option<String>,
    pub mime_type: Option<String>,
    #[serde(alias = "token")]
    pub image_token: Option<String>,
    pub question: Option<String>,
    pub language: Option<String>,
    pub verbosity: Option<Verbosity>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OcrBody {
    pub image: Option<String>,
    pub mime_type: Option<String>,
    #[serde(alias = "token")]
    pub image_token: Option<String>,
    pub language: Option<String>,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadBody {
    pub image: Option<String>,
    pub mime_type: Option<String>,
}

/// Turns the wire fields into an [`ImageSource`]. Inline data wins over a
/// token; an inline payload that fails to decode is reported, not dropped.
pub fn decode_source(
    image: Option<&str>,
    mime_type: Option<&str>,
    token: Option<String>,
) -> ImageSource {
    let Some(encoded) = image.map(str::trim).filter(|s| !s.is_empty()) else {
        return ImageSource::from_parts(None, token);
    };

    let (url_mime, payload) = split_data_url(encoded);
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) if bytes.is_empty() => ImageSource::Undecodable("empty image payload".into()),
        Ok(bytes) => ImageSource::Inline(Image::from_upload(bytes, mime_type.or(url_mime))),
        Err(e) => ImageSource::Undecodable(format!("invalid base64: {e}")),
    }
}

fn split_data_url(encoded: &str) -> (Option<&str>, &str) {
    if let Some(rest) = encoded.strip_prefix("data:") {
        if let Some((meta, data)) = rest.split_once(',') {
            let mime = meta.split(';').next().filter(|m| !m.is_empty());
            return (mime, data);
        }
    }
    (None, encoded)
}

fn correlation_id(body_value: Option<String>, headers: &HeaderMap) -> Option<String> {
    body_value.or_else(|| {
        headers
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

fn language_or_default(language: Option<String>) -> String {
    language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

fn respond<T: Serialize>(reply: Reply<T>, success: StatusCode) -> Response {
    let status = match &reply.result {
        Ok(_) => success,
        Err(failure) => status_for(failure.code),
    };
    (status, Json(reply)).into_response()
}

/// Answers a body axum could not deserialize with the usual envelope, and
/// still writes its telemetry record.
fn rejected(state: &AppState, mode: Mode, rejection: JsonRejection, headers: &HeaderMap) -> Response {
    let failure = Failure::new(ErrorCode::InvalidImage, "The request could not be read.")
        .with_details(rejection.body_text());
    let reply = state
        .pipeline
        .reject::<()>(mode, failure, correlation_id(None, headers));
    respond(reply, StatusCode::OK)
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn assist(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AssistBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&state, Mode::Assist, rejection, &headers),
    };
    let source = decode_source(
        body.image.as_deref(),
        body.mime_type.as_deref(),
        body.image_token,
    );
    let request = AssistRequest {
        source,
        question: body.question,
        language: language_or_default(body.language),
        verbosity: body.verbosity.unwrap_or_default(),
        session_id: body.session_id,
        correlation_id: correlation_id(body.correlation_id, &headers),
    };
    respond(state.pipeline.assist(request).await, StatusCode::OK)
}

pub async fn ocr(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<OcrBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&state, Mode::Ocr, rejection, &headers),
    };
    let source = decode_source(
        body.image.as_deref(),
        body.mime_type.as_deref(),
        body.image_token,
    );
    let request = OcrRequest {
        source,
        language: language_or_default(body.language),
        session_id: body.session_id,
        correlation_id: correlation_id(body.correlation_id, &headers),
    };
    respond(state.pipeline.ocr(request).await, StatusCode::OK)
}

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UploadBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&state, Mode::Upload, rejection, &headers),
    };
    let source = decode_source(body.image.as_deref(), body.mime_type.as_deref(), None);
    respond(state.pipeline.store_image(source).await, StatusCode::CREATED)
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.telemetry.metrics())
}
