//! One-shot runner against a mock origin.

mod common;

use std::sync::Arc;

use common::{test_config, FakeEngine};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn run_file_executes_job_to_completion() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("CLIP"))
        .mount(&origin)
        .await;

    let storage = tempfile::tempdir().unwrap();
    let job_file = storage.path().join("job.json");
    std::fs::write(
        &job_file,
        serde_json::json!({
            "type": "convert-default",
            "sources": [format!("{}/clip.mp4", origin.uri())],
        })
        .to_string(),
    )
    .unwrap();

    let config = test_config(&storage.path().join("data"));
    let engine = Arc::new(FakeEngine::default());
    let run = mediaflow::runner::run_file(&config, engine.clone(), &job_file)
        .await
        .unwrap();

    assert!(run.outcome.is_completed());
    let artifact = run.outcome.artifact_locator.unwrap();
    assert_eq!(std::fs::read_to_string(artifact).unwrap(), "CLIP");
    assert_eq!(engine.recipes().len(), 1);
}

#[tokio::test]
async fn run_file_reports_failed_job_without_error() {
    let storage = tempfile::tempdir().unwrap();
    let job_file = storage.path().join("job.json");
    std::fs::write(
        &job_file,
        r#"{"type": "merge", "sources": ["file:///etc/passwd", "gopher://x/y"]}"#,
    )
    .unwrap();

    let config = test_config(&storage.path().join("data"));
    let run = mediaflow::runner::run_file(&config, Arc::new(FakeEngine::default()), &job_file)
        .await
        .unwrap();

    assert!(!run.outcome.is_completed());
    assert_eq!(run.error_code, Some("no_valid_inputs"));
}
