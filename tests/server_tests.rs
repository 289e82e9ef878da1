mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::{png, FakeProvider};
use lumen::clock::{Clock, ManualClock};
use lumen::error::{ErrorCode, Failure};
use lumen::pipeline::{Pipeline, PipelineConfig};
use lumen::server::{self, status_for, AppState, DEFAULT_BODY_LIMIT};
use lumen::store::SharedImageStore;
use lumen::telemetry::RingTelemetry;

struct TestApp {
    router: Router,
    telemetry: Arc<RingTelemetry>,
}

fn app(provider: FakeProvider) -> TestApp {
    app_with_limit(provider, DEFAULT_BODY_LIMIT)
}

fn app_with_limit(provider: FakeProvider, body_limit: usize) -> TestApp {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
    let telemetry = Arc::new(RingTelemetry::new(100));
    let pipeline = Pipeline::new(
        Arc::new(SharedImageStore::new(clock.clone())),
        Arc::new(provider),
        telemetry.clone(),
        clock,
        PipelineConfig::default(),
    );
    let router = server::router(
        AppState {
            pipeline: Arc::new(pipeline),
            telemetry: telemetry.clone(),
        },
        body_limit,
    );
    TestApp { router, telemetry }
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    call_raw(router, method, uri, body).await
}

async fn call_raw(router: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-correlation-id", "test-run")
        .body(body)
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn encoded_png() -> String {
    STANDARD.encode(png().bytes())
}

#[tokio::test]
async fn assist_with_inline_image_returns_envelope() {
    let test = app(FakeProvider::answering(
        "{\"spoken\": \"Stairs going down.\", \"details\": [\"Handrail on the right\"]}",
    ));

    let (status, body) = call(
        &test.router,
        "POST",
        "/v1/assist",
        Some(json!({ "image": encoded_png(), "language": "en", "verbosity": "brief" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["spoken"], "Stairs going down.");
    assert_eq!(body["data"]["details"][0], "Handrail on the right");
    assert!(body["data"]["follow_up_token"].is_string());
    assert!(body["timing"]["total_ms"].is_u64());
    assert!(body["timing"]["inspection_ms"].is_u64());

    let records = test.telemetry.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].correlation_id.as_deref(), Some("test-run"));
}

#[tokio::test]
async fn missing_image_is_bad_request() {
    let test = app(FakeProvider::answering("unused"));

    let (status, body) = call(&test.router, "POST", "/v1/assist", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["err_code"], "INVALID_IMAGE");
    assert!(body["error"]["message"].is_string());
    assert!(body["timing"].is_object());
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let test = app(FakeProvider::answering("unused"));

    let (status, body) = call(
        &test.router,
        "POST",
        "/v1/ocr",
        Some(json!({ "image_token": "0123456789abcdef" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["err_code"], "IMAGE_NOT_FOUND");
}

#[tokio::test]
async fn invalid_base64_is_bad_request_with_details() {
    let test = app(FakeProvider::answering("unused"));

    let (status, body) = call(
        &test.router,
        "POST",
        "/v1/assist",
        Some(json!({ "image": "%%%" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["err_code"], "INVALID_IMAGE");
    assert!(body["error"]["details"].as_str().unwrap().contains("base64"));
}

#[tokio::test]
async fn unreadable_body_still_gets_an_envelope_and_a_record() {
    let test = app(FakeProvider::answering("unused"));

    let (status, body) = call_raw(
        &test.router,
        "POST",
        "/v1/assist",
        Body::from("{\"image\": \"abc\""),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["err_code"], "INVALID_IMAGE");
    assert!(body["error"]["details"].is_string());
    assert!(body["timing"]["total_ms"].is_u64());

    let records = test.telemetry.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].route, "/v1/assist");
    assert_eq!(records[0].err_code, Some(ErrorCode::InvalidImage));
    assert_eq!(records[0].correlation_id.as_deref(), Some("test-run"));
}

#[tokio::test]
async fn unknown_verbosity_falls_back_to_normal() {
    let test = app(FakeProvider::answering("A crosswalk."));

    let (status, body) = call(
        &test.router,
        "POST",
        "/v1/assist",
        Some(json!({ "image": encoded_png(), "verbosity": "loud" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["spoken"], "A crosswalk.");
    assert_eq!(test.telemetry.len(), 1);
}

#[tokio::test]
async fn oversized_upload_is_rejected_with_a_record() {
    let test = app_with_limit(FakeProvider::answering("unused"), 64);

    let (status, body) = call(
        &test.router,
        "POST",
        "/v1/images",
        Some(json!({ "image": "A".repeat(256) })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["err_code"], "INVALID_IMAGE");
    let records = test.telemetry.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].route, "/v1/images");
}

#[tokio::test]
async fn uploaded_token_can_be_reused() {
    let test = app(FakeProvider::answering("Price tag says four dollars."));

    let (status, uploaded) = call(
        &test.router,
        "POST",
        "/v1/images",
        Some(json!({ "image": format!("data:image/png;base64,{}", encoded_png()) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = uploaded["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(uploaded["data"]["expires_in_ms"], 600_000);

    let (status, body) = call(
        &test.router,
        "POST",
        "/v1/ocr",
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["spoken"], "Price tag says four dollars.");
    assert_eq!(body["data"]["details"], json!([]));
}

#[tokio::test]
async fn provider_timeout_maps_to_gateway_timeout() {
    let test = app(FakeProvider::failing_generate(Failure::new(
        ErrorCode::ProviderTimeout,
        "The vision backend took too long to respond.",
    )));

    let (status, body) = call(
        &test.router,
        "POST",
        "/v1/ocr",
        Some(json!({ "image": encoded_png() })),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["err_code"], "PROVIDER_TIMEOUT");
}

#[tokio::test]
async fn metrics_reflect_handled_requests() {
    let test = app(FakeProvider::answering("ok"));

    call(&test.router, "POST", "/v1/assist", Some(json!({ "image": encoded_png() }))).await;
    call(&test.router, "POST", "/v1/assist", Some(json!({}))).await;
    call(&test.router, "POST", "/v1/ocr", Some(json!({ "image_token": "gone" }))).await;

    let (status, metrics) = call(&test.router, "GET", "/v1/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["total_calls"], 3);
    assert_eq!(metrics["successes"], 1);
    assert_eq!(metrics["errors"]["INVALID_IMAGE"], 1);
    assert_eq!(metrics["errors"]["IMAGE_NOT_FOUND"], 1);
    assert_eq!(metrics["calls_by_mode"]["assist"], 2);
    assert_eq!(metrics["calls_by_mode"]["ocr"], 1);
}

#[tokio::test]
async fn health_is_ok() {
    let test = app(FakeProvider::answering("unused"));
    let (status, body) = call(&test.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[test]
fn every_code_has_a_status() {
    assert_eq!(status_for(ErrorCode::InvalidImage), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorCode::ImageNotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCode::ProviderError), StatusCode::BAD_GATEWAY);
    assert_eq!(status_for(ErrorCode::MalformedResponse), StatusCode::BAD_GATEWAY);
    assert_eq!(status_for(ErrorCode::StorageError), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(status_for(ErrorCode::StorageTimeout), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(status_for(ErrorCode::Unknown), StatusCode::INTERNAL_SERVER_ERROR);
}
