//! Unified error type for mediaflow.
//!
//! Every stage of a job run funnels its failures into [`Error`]. The variant
//! decides whether a redelivery could plausibly succeed
//! ([`Error::retryable`]) and which HTTP status the API answers with
//! ([`Error::http_status`]).

use std::fmt;

/// Unified error type covering all failure modes in mediaflow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A submitted job description is malformed. Raised before a job exists.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// None of the declared sources could be fetched.
    #[error("No valid input files provided")]
    NoValidInputs,

    /// Transport failure on a source that should have been retrievable.
    #[error("Fetch error [{locator}]: {message}")]
    Fetch {
        /// The source locator that failed.
        locator: String,
        /// Human-readable error description.
        message: String,
    },

    /// The transformation engine rejected the options or input, or crashed.
    #[error("Transform error: {message}")]
    Transform {
        /// Diagnostic text reported by the engine.
        message: String,
    },

    /// An external tool could not be located, spawned, or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Callback delivery failed. Never changes a job's status.
    #[error("Notify error: {0}")]
    Notify(String),

    /// The job queue has been closed and accepts no more work.
    #[error("Queue closed")]
    QueueClosed,

    /// The job queue is at capacity.
    #[error("Queue full")]
    QueueFull,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound { .. } => 404,
            Error::NoValidInputs => 422,
            Error::Fetch { .. } => 502,
            Error::Transform { .. } => 422,
            Error::Tool { .. } => 502,
            Error::Io { .. } => 500,
            Error::Notify(_) => 502,
            Error::QueueClosed | Error::QueueFull => 503,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound { .. } => "not_found",
            Error::NoValidInputs => "no_valid_inputs",
            Error::Fetch { .. } => "fetch_error",
            Error::Transform { .. } => "transform_error",
            Error::Tool { .. } => "tool_error",
            Error::Io { .. } => "io_error",
            Error::Notify(_) => "notify_error",
            Error::QueueClosed => "queue_closed",
            Error::QueueFull => "queue_full",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether re-running the same job could plausibly succeed.
    ///
    /// Engine diagnostics and missing inputs are deterministic; transport,
    /// tooling and filesystem problems are environmental.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Error::Fetch { .. } | Error::Tool { .. } | Error::Io { .. } | Error::QueueFull
        )
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Fetch`].
    pub fn fetch(locator: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Fetch {
            locator: locator.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Transform`].
    pub fn transform(message: impl Into<String>) -> Self {
        Error::Transform {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("job", "abc-123");
        assert_eq!(err.to_string(), "job not found: abc-123");
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn no_valid_inputs_display() {
        let err = Error::NoValidInputs;
        assert_eq!(err.to_string(), "No valid input files provided");
        assert!(!err.retryable());
    }

    #[test]
    fn fetch_display() {
        let err = Error::fetch("http://example.com/a.mp4", "HTTP status 404 Not Found");
        assert_eq!(
            err.to_string(),
            "Fetch error [http://example.com/a.mp4]: HTTP status 404 Not Found"
        );
        assert!(err.retryable());
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn transform_is_not_retryable() {
        let err = Error::transform("Invalid data found when processing input");
        assert_eq!(
            err.to_string(),
            "Transform error: Invalid data found when processing input"
        );
        assert!(!err.retryable());
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "timed out after 5s");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: timed out after 5s");
        assert!(err.retryable());
    }

    #[test]
    fn notify_is_not_retryable() {
        let err = Error::Notify("connection refused".into());
        assert!(!err.retryable());
        assert_eq!(err.code(), "notify_error");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn queue_errors_map_to_503() {
        assert_eq!(Error::QueueClosed.http_status(), 503);
        assert_eq!(Error::QueueFull.http_status(), 503);
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("sources must not be empty".into());
        assert_eq!(err.to_string(), "Validation error: sources must not be empty");
        assert_eq!(err.http_status(), 400);
    }
}
