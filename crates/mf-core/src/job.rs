//! Job model: descriptors, outcomes, and the execution state machine.
//!
//! A [`JobDescriptor`] is the immutable description of one unit of work as
//! delivered by the queue. A run of that descriptor walks the [`JobState`]
//! machine and ends with exactly one [`JobOutcome`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::JobId;

/// Opaque key/value options passed through to the transformation engine.
pub type JobOptions = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// JobType
// ---------------------------------------------------------------------------

/// The transformation recipe family requested by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobType {
    /// Concatenate all inputs in declared order.
    Merge,
    /// Scale the first input to a target resolution.
    Resize,
    /// Re-encode the first input with engine defaults.
    ConvertDefault,
}

impl JobType {
    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Merge => "merge",
            JobType::Resize => "resize",
            JobType::ConvertDefault => "convert-default",
        }
    }

    /// Parse a job type, mapping unknown names onto the convert recipe.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" | "video_merge" => JobType::Merge,
            "resize" | "image_resize" => JobType::Resize,
            "convert-default" | "convert" | "video_convert" => JobType::ConvertDefault,
            other => {
                tracing::debug!("Unknown job type '{other}', using convert-default");
                JobType::ConvertDefault
            }
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobType {
    fn from(s: String) -> Self {
        JobType::parse_lenient(&s)
    }
}

impl From<JobType> for String {
    fn from(t: JobType) -> Self {
        t.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A target frame size in pixels, written as `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::transform(format!("invalid resolution '{s}', expected WxH"));
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// JobDescriptor / JobSubmission
// ---------------------------------------------------------------------------

/// Immutable description of one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(default)]
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    /// Ordered resource locators. Order is significant for merge.
    pub sources: Vec<String>,
    #[serde(default)]
    pub options: JobOptions,
    /// Optional HTTP target that receives the outcome.
    #[serde(default, alias = "webhook_url", skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
}

impl JobDescriptor {
    /// Create a descriptor with a fresh id, no options and no callback.
    pub fn new(job_type: JobType, sources: Vec<String>) -> Self {
        Self {
            id: JobId::new(),
            job_type,
            sources,
            options: JobOptions::new(),
            callback: None,
        }
    }

    /// Builder: set the options map.
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder: set the callback target.
    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }
}

/// A job request as submitted by a caller, before an id is assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSubmission {
    #[serde(rename = "type")]
    pub job_type: String,
    pub sources: Vec<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl JobSubmission {
    /// Validate the submission and bind it to a queue-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the sources list is empty, a
    /// locator is blank, options are not a JSON object, or the callback is
    /// not an http(s) URL.
    pub fn into_descriptor(self, id: JobId) -> Result<JobDescriptor> {
        if self.job_type.trim().is_empty() {
            return Err(Error::Validation("type is required".into()));
        }
        if self.sources.is_empty() {
            return Err(Error::Validation("sources must not be empty".into()));
        }
        if let Some(i) = self.sources.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::Validation(format!("sources[{i}] is blank")));
        }

        let options = match self.options {
            None | Some(serde_json::Value::Null) => JobOptions::new(),
            Some(serde_json::Value::Object(map)) => map,
            Some(_) => return Err(Error::Validation("options must be a JSON object".into())),
        };

        let callback = match self.webhook_url {
            Some(url) if !url.trim().is_empty() => {
                validate_http_url(&url)?;
                Some(url.trim().to_string())
            }
            _ => None,
        };

        Ok(JobDescriptor {
            id,
            job_type: JobType::parse_lenient(&self.job_type),
            sources: self.sources.into_iter().map(|s| s.trim().to_string()).collect(),
            options,
            callback,
        })
    }
}

fn validate_http_url(url: &str) -> Result<()> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| Error::Validation(format!("webhook_url must be http(s): {url}")))?;
    if rest.is_empty() || rest.starts_with('/') || rest.contains(char::is_whitespace) {
        return Err(Error::Validation(format!("webhook_url is not a valid URL: {url}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JobOutcome
// ---------------------------------------------------------------------------

/// Terminal status of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Completed => f.write_str("completed"),
            OutcomeStatus::Failed => f.write_str("failed"),
        }
    }
}

/// The terminal result of one job run. Also the callback payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub id: JobId,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    /// A successful outcome pointing at the produced artifact.
    pub fn completed(id: JobId, artifact_locator: impl Into<String>) -> Self {
        Self {
            id,
            status: OutcomeStatus::Completed,
            artifact_locator: Some(artifact_locator.into()),
            error: None,
        }
    }

    /// A failed outcome carrying a human-readable description.
    pub fn failed(id: JobId, error: impl fmt::Display) -> Self {
        Self {
            id,
            status: OutcomeStatus::Failed,
            artifact_locator: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Execution state of a single job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Fetching,
    Transforming,
    Failed,
    Notifying,
    Cleanup,
    Done(OutcomeStatus),
}

impl JobState {
    /// Whether the machine may move from `self` to `next`.
    ///
    /// `Failed` is reachable only from the stages that do real work; notify
    /// and cleanup never fail a job.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Pending, Failed)
                | (Fetching, Transforming)
                | (Fetching, Failed)
                | (Transforming, Notifying)
                | (Transforming, Failed)
                | (Failed, Notifying)
                | (Notifying, Cleanup)
                | (Cleanup, Done(_))
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => f.write_str("pending"),
            JobState::Fetching => f.write_str("fetching"),
            JobState::Transforming => f.write_str("transforming"),
            JobState::Failed => f.write_str("failed"),
            JobState::Notifying => f.write_str("notifying"),
            JobState::Cleanup => f.write_str("cleanup"),
            JobState::Done(status) => write!(f, "done:{status}"),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Coarse status exposed through the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl From<OutcomeStatus> for JobStatus {
    fn from(s: OutcomeStatus) -> Self {
        match s {
            OutcomeStatus::Completed => JobStatus::Completed,
            OutcomeStatus::Failed => JobStatus::Failed,
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::Validation(format!("unknown job status: {other}"))),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
