//! HTTP surface over the pipeline.
//!
//! Handlers only translate JSON into pipeline requests and `err_code`s into
//! status codes; all behaviour lives in [`crate::pipeline`].

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::error::ErrorCode;
use crate::pipeline::{Pipeline, ROUTE_ASSIST, ROUTE_OCR, ROUTE_UPLOAD};
use crate::telemetry::RingTelemetry;

pub mod handlers;

pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub telemetry: Arc<RingTelemetry>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(ROUTE_ASSIST, post(handlers::assist))
        .route(ROUTE_OCR, post(handlers::ocr))
        .route(ROUTE_UPLOAD, post(handlers::upload))
        .route("/v1/metrics", get(handlers::metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidImage => StatusCode::BAD_REQUEST,
        ErrorCode::ImageNotFound => StatusCode::NOT_FOUND,
        ErrorCode::ProviderTimeout | ErrorCode::StorageTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::ProviderError | ErrorCode::MalformedResponse => StatusCode::BAD_GATEWAY,
        ErrorCode::StorageError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
