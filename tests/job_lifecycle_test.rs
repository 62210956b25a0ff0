//! End-to-end job runs: submit over HTTP, fetch from a mock origin, render
//! with the concat engine, and deliver the outcome to a mock webhook.

mod common;

use common::{FakeEngine, TestHarness};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn origin() -> MockServer {
    let server = MockServer::start().await;
    for (name, body) in [("a.mp4", "AAA"), ("b.mp4", "BBB"), ("c.mp4", "CCC")] {
        Mock::given(method("GET"))
            .and(path(format!("/media/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/media/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

async fn webhook() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn callback_body(hook: &MockServer) -> serde_json::Value {
    let requests = hook.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

#[tokio::test]
async fn merge_concatenates_in_declared_order() {
    let origin = origin().await;
    let hook = webhook().await;
    let harness = TestHarness::start().await;

    let job_id = harness
        .submit(json!({
            "type": "video_merge",
            "sources": [
                format!("{}/media/c.mp4", origin.uri()),
                format!("{}/media/a.mp4", origin.uri()),
                format!("{}/media/b.mp4", origin.uri()),
            ],
            "webhook_url": format!("{}/hook", hook.uri()),
        }))
        .await;

    let status = harness.wait_for_terminal(&job_id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["state"], "done:completed");
    assert_eq!(status["callback"], "delivered");
    assert_eq!(status["attempts"], 1);

    let artifact = status["result"]["artifact_locator"].as_str().unwrap();
    assert_eq!(std::fs::read_to_string(artifact).unwrap(), "CCCAAABBB");

    let payload = callback_body(&hook).await;
    assert_eq!(payload["id"], job_id.as_str());
    assert_eq!(payload["status"], "completed");
    assert_eq!(payload["artifact_locator"], artifact);

    // Only the artifact survives cleanup.
    let job_dir = harness.storage.path().join(&job_id);
    let entries: Vec<_> = std::fs::read_dir(&job_dir).unwrap().collect();
    assert_eq!(entries.len(), 1);

    // The delivery is acknowledged right after the status record turns
    // terminal; shutting down drains the worker first.
    let queue = harness.ctx.queue.clone();
    harness.shutdown().await;
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.acked(), 1);
}

#[tokio::test]
async fn resize_uses_requested_resolution() {
    let origin = origin().await;
    let harness = TestHarness::start().await;

    let job_id = harness
        .submit(json!({
            "type": "image_resize",
            "sources": [format!("{}/media/a.mp4", origin.uri())],
            "options": {"resolution": "320x240"},
        }))
        .await;

    let status = harness.wait_for_terminal(&job_id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["callback"], "skipped");

    let artifact = status["result"]["artifact_locator"].as_str().unwrap();
    assert_eq!(std::fs::read_to_string(artifact).unwrap(), "320x240:AAA");
    harness.shutdown().await;
}

#[tokio::test]
async fn unreachable_sources_are_skipped() {
    let origin = origin().await;
    let harness = TestHarness::start().await;

    let job_id = harness
        .submit(json!({
            "type": "merge",
            "sources": [
                "ftp://elsewhere/x.mp4",
                format!("{}/media/b.mp4", origin.uri()),
            ],
        }))
        .await;

    let status = harness.wait_for_terminal(&job_id).await;
    assert_eq!(status["status"], "completed");
    let artifact = status["result"]["artifact_locator"].as_str().unwrap();
    assert_eq!(std::fs::read_to_string(artifact).unwrap(), "BBB");
    harness.shutdown().await;
}

#[tokio::test]
async fn failed_fetch_fails_job_and_notifies() {
    let origin = origin().await;
    let hook = webhook().await;
    let harness = TestHarness::start().await;

    let job_id = harness
        .submit(json!({
            "type": "merge",
            "sources": [
                format!("{}/media/a.mp4", origin.uri()),
                format!("{}/media/missing.mp4", origin.uri()),
            ],
            "webhook_url": format!("{}/hook", hook.uri()),
        }))
        .await;

    let status = harness.wait_for_terminal(&job_id).await;
    assert_eq!(status["status"], "failed");
    assert_eq!(status["state"], "done:failed");
    assert_eq!(status["error_code"], "fetch_error");
    assert!(status["result"]["artifact_locator"].is_null());

    let payload = callback_body(&hook).await;
    assert_eq!(payload["status"], "failed");
    assert!(payload["error"].as_str().unwrap().contains("404"));

    // Nothing was rendered.
    assert!(harness.engine.recipes().is_empty());
    harness.shutdown().await;
}

#[tokio::test]
async fn engine_diagnostic_is_reported() {
    let origin = origin().await;
    let hook = webhook().await;
    let harness = TestHarness::with_engine(FakeEngine::failing("Unknown encoder 'h999'")).await;

    let job_id = harness
        .submit(json!({
            "type": "convert-default",
            "sources": [format!("{}/media/a.mp4", origin.uri())],
            "options": {"ffmpeg_options": {"c:v": "h999"}},
            "webhook_url": format!("{}/hook", hook.uri()),
        }))
        .await;

    let status = harness.wait_for_terminal(&job_id).await;
    assert_eq!(status["status"], "failed");
    assert_eq!(status["error_code"], "transform_error");
    assert!(status["result"]["error"]
        .as_str()
        .unwrap()
        .contains("Unknown encoder"));

    let payload = callback_body(&hook).await;
    assert!(payload["error"].as_str().unwrap().contains("Unknown encoder"));
    harness.shutdown().await;
}

#[tokio::test]
async fn webhook_failure_does_not_change_outcome() {
    let origin = origin().await;
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&hook)
        .await;
    let harness = TestHarness::start().await;

    let job_id = harness
        .submit(json!({
            "type": "resize",
            "sources": [format!("{}/media/a.mp4", origin.uri())],
            "webhook_url": format!("{}/hook", hook.uri()),
        }))
        .await;

    let status = harness.wait_for_terminal(&job_id).await;
    assert_eq!(status["status"], "completed");
    assert!(status["callback"].as_str().unwrap().starts_with("failed"));

    let queue = harness.ctx.queue.clone();
    harness.shutdown().await;
    assert_eq!(queue.acked(), 1);
}

#[tokio::test]
async fn jobs_listing_includes_finished_jobs() {
    let origin = origin().await;
    let harness = TestHarness::start().await;

    let mut ids = Vec::new();
    for name in ["a.mp4", "b.mp4"] {
        ids.push(
            harness
                .submit(json!({
                    "type": "convert",
                    "sources": [format!("{}/media/{name}", origin.uri())],
                }))
                .await,
        );
    }
    for id in &ids {
        harness.wait_for_terminal(id).await;
    }

    let list: Vec<serde_json::Value> = reqwest::get(harness.url("/api/v1/jobs?status=completed"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 2);
    harness.shutdown().await;
}
