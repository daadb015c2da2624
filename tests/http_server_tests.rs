//! HTTP server and routing integration tests
//!
//! Drives the real router with tower's oneshot, substituting scripted
//! storage and compute collaborators through AppState.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use helpers::*;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use stemgate::{build_router, AppState};

const BOUNDARY: &str = "stemgate-test-boundary";

async fn test_app(reply: Reply) -> (Router, Arc<ScriptedBackend>, Arc<MemoryStore>) {
    let pool = test_pool().await;
    let store = MemoryStore::new();
    let backend = ScriptedBackend::new(reply);
    let orch = Arc::new(orchestrator(&pool, store.clone(), backend.clone()));
    let app = build_router(AppState::new(pool, orch));
    (app, backend, store)
}

/// Assemble a multipart/form-data body from text fields and an optional
/// file part.
fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: audio/mpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_multipart(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_module_and_version() {
    let (app, _, _) = test_app(Reply::Midi).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "stemgate");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn per_kind_health_endpoints_are_static() {
    let (app, _, _) = test_app(Reply::Midi).await;

    for kind in ["transcribe", "separate", "multitrack"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/{kind}/health"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{kind} health");
        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], kind);
    }
}

#[tokio::test]
async fn separate_rejects_out_of_set_stems_before_any_work() {
    let (app, backend, store) = test_app(Reply::Stems).await;

    let body = multipart_body(&[("stems", "3")], Some(("song.mp3", b"abc")));
    let response = app.oneshot(post_multipart("/api/separate", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "INVALID_INPUT");
    // Rejected before fingerprinting, staging or the backend call
    assert_eq!(store.upload_count(), 0);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn separate_rejects_non_numeric_stems() {
    let (app, _, _) = test_app(Reply::Stems).await;

    let body = multipart_body(&[("stems", "many")], Some(("song.mp3", b"abc")));
    let response = app.oneshot(post_multipart("/api/separate", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let (app, _, _) = test_app(Reply::Stems).await;

    let body = multipart_body(&[("stems", "2")], None);
    let response = app.oneshot(post_multipart("/api/separate", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn separate_round_trip_then_cache_hit() {
    let (app, backend, _) = test_app(Reply::Stems).await;

    let body = multipart_body(&[("stems", "2")], Some(("song.mp3", b"abc")));
    let response = app
        .clone()
        .oneshot(post_multipart("/api/separate", body.clone()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["download_url"], "s3://bucket/out.zip");
    assert_eq!(json["from_cache"], false);
    assert_eq!(json["files"][0]["name"], "vocals.mp3");

    // Identical payload and stems: served from cache, backend untouched
    let response = app.oneshot(post_multipart("/api/separate", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["from_cache"], true);
    assert_eq!(json["download_url"], "s3://bucket/out.zip");
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn transcribe_returns_midi_url() {
    let (app, _, _) = test_app(Reply::Midi).await;

    let body = multipart_body(&[], Some(("piano.wav", b"piano audio")));
    let response = app.oneshot(post_multipart("/api/transcribe", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["midi_url"], "s3://bucket/out/result.mid");
    assert_eq!(json["from_cache"], false);
    assert_eq!(json["job_id"], "rp-test");
}

#[tokio::test]
async fn multitrack_returns_midi_url() {
    let (app, _, _) = test_app(Reply::Midi).await;

    let body = multipart_body(&[], Some(("band.mp3", b"band audio")));
    let response = app.oneshot(post_multipart("/api/multitrack", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["midi_url"], "s3://bucket/out/result.mid");
}

#[tokio::test]
async fn backend_failure_surfaces_as_server_error() {
    let (app, _, _) = test_app(Reply::Failure("worker exploded".to_string())).await;

    let body = multipart_body(&[], Some(("song.mp3", b"abc")));
    let response = app.oneshot(post_multipart("/api/transcribe", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "BACKEND_FAILURE");
}

#[tokio::test]
async fn backend_timeout_surfaces_as_server_error() {
    let (app, _, _) = test_app(Reply::Timeout).await;

    let body = multipart_body(&[], Some(("song.mp3", b"abc")));
    let response = app.oneshot(post_multipart("/api/transcribe", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "BACKEND_TIMEOUT");
}
