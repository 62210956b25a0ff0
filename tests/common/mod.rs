//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which runs the full HTTP API and worker on a
//! random port against a temporary storage root and a [`FakeEngine`] in
//! place of ffmpeg.

#![allow(dead_code, unused_imports)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mf_core::config::Config;
use mf_server::AppContext;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use mf_pipeline::testing::FakeEngine;

/// Config with a temporary storage root and short timeouts.
pub fn test_config(storage: &Path) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.storage.root = storage.to_path_buf();
    config.fetch.timeout_secs = 5;
    config.notify.timeout_secs = 5;
    config.worker.concurrency = 2;
    config
}

/// A running server plus the handles needed to inspect and stop it.
pub struct TestHarness {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub engine: Arc<FakeEngine>,
    pub storage: TempDir,
    cancel: CancellationToken,
    handle: JoinHandle<mf_core::Result<()>>,
}

impl TestHarness {
    pub async fn start() -> Self {
        Self::with_engine(FakeEngine::default()).await
    }

    pub async fn with_engine(engine: FakeEngine) -> Self {
        let storage = tempfile::tempdir().expect("failed to create storage dir");
        let ctx = AppContext::new(test_config(storage.path()));
        let engine = Arc::new(engine);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(mf_server::serve(
            ctx.clone(),
            engine.clone(),
            listener,
            cancel.clone(),
        ));

        Self {
            ctx,
            addr,
            engine,
            storage,
            cancel,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Submit a job and return its id.
    pub async fn submit(&self, body: serde_json::Value) -> String {
        let resp = reqwest::Client::new()
            .post(self.url("/api/v1/jobs/process-media"))
            .json(&body)
            .send()
            .await
            .expect("submit request failed");
        assert_eq!(resp.status(), 202, "submission rejected");
        let json: serde_json::Value = resp.json().await.unwrap();
        json["job_id"].as_str().unwrap().to_string()
    }

    /// Poll the status endpoint until the job is completed or failed.
    pub async fn wait_for_terminal(&self, job_id: &str) -> serde_json::Value {
        let client = reqwest::Client::new();
        let url = self.url(&format!("/api/v1/jobs/{job_id}"));
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);

        loop {
            let json: serde_json::Value = client
                .get(&url)
                .send()
                .await
                .expect("status request failed")
                .json()
                .await
                .unwrap();
            let status = json["status"].as_str().unwrap_or_default();
            if status == "completed" || status == "failed" {
                return json;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {job_id} did not finish, last status: {json}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Cancel the server and wait for the worker to drain.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}
