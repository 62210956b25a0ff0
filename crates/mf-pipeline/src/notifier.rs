//! Outcome callbacks.
//!
//! Delivery is best-effort: one POST of the serialized [`JobOutcome`], no
//! retries. Failures are logged and reported back as a
//! [`CallbackResult`] but never change the job's outcome.

use mf_core::config::NotifyConfig;
use mf_core::{Error, JobOutcome, Result};
use reqwest::Client;
use serde::Serialize;

/// What happened to a job's callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "lowercase")]
pub enum CallbackResult {
    /// The job declared no callback target.
    Skipped,
    /// The target answered with a 2xx status.
    Delivered,
    /// The POST failed; the reason is kept for logs and status queries.
    Failed(String),
}

/// Sends job outcomes to caller-declared callback targets.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
}

impl Notifier {
    pub fn new(config: &NotifyConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build callback HTTP client: {e}");
                Client::new()
            });

        Self { client }
    }

    /// Deliver `outcome` to `callback` if one is set.
    pub async fn notify(&self, callback: Option<&str>, outcome: &JobOutcome) -> CallbackResult {
        let Some(url) = callback else {
            tracing::debug!(job_id = %outcome.id, "No callback declared");
            return CallbackResult::Skipped;
        };

        match self.post(url, outcome).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %outcome.id,
                    status = %outcome.status,
                    "Callback delivered"
                );
                CallbackResult::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %outcome.id,
                    callback = %url,
                    error = %e,
                    "Callback delivery failed"
                );
                CallbackResult::Failed(e.to_string())
            }
        }
    }

    async fn post(&self, url: &str, outcome: &JobOutcome) -> Result<()> {
        let resp = self
            .client
            .post(url)
            .json(outcome)
            .send()
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Notify(format!("HTTP status {status}: {}", body.trim())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mf_core::JobId;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier() -> Notifier {
        Notifier::new(&NotifyConfig::default())
    }

    #[tokio::test]
    async fn no_callback_is_skipped() {
        let outcome = JobOutcome::completed(JobId::new(), "/data/x/output.mp4");
        assert_eq!(notifier().notify(None, &outcome).await, CallbackResult::Skipped);
    }

    #[tokio::test]
    async fn posts_outcome_once() {
        let server = MockServer::start().await;
        let outcome = JobOutcome::completed(JobId::new(), "/data/x/output.mp4");

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(&outcome))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/hook", server.uri());
        let result = notifier().notify(Some(&url), &outcome).await;
        assert_eq!(result, CallbackResult::Delivered);
    }

    #[tokio::test]
    async fn server_error_is_reported_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = JobOutcome::failed(JobId::new(), "No valid input files provided");
        let result = notifier().notify(Some(&server.uri()), &outcome).await;
        assert_matches!(result, CallbackResult::Failed(ref reason) if reason.contains("500"));
    }

    #[tokio::test]
    async fn slow_target_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let n = Notifier::new(&NotifyConfig { timeout_secs: 1 });
        let outcome = JobOutcome::completed(JobId::new(), "/data/x/output.mp4");
        let result = n.notify(Some(&server.uri()), &outcome).await;
        assert_matches!(result, CallbackResult::Failed(_));
    }

    #[tokio::test]
    async fn unreachable_target_fails() {
        let outcome = JobOutcome::completed(JobId::new(), "/data/x/output.mp4");
        let result = notifier().notify(Some("http://127.0.0.1:9/hook"), &outcome).await;
        assert_matches!(result, CallbackResult::Failed(_));
    }
}
