//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, storage, worker, fetch/transform/notify
//! timeouts, recipe defaults and tool paths. Every section defaults sensibly
//! so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::job::{JobOptions, Resolution};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
    pub queue: QueueConfig,
    pub status: StatusConfig,
    pub fetch: FetchConfig,
    pub transform: TransformConfig,
    pub notify: NotifyConfig,
    pub defaults: RecipeDefaults,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.storage.output_extension.trim().is_empty() {
            warnings.push("storage.output_extension is empty".into());
        }

        if self.worker.concurrency == 0 {
            warnings.push("worker.concurrency is 0; one job will run at a time".into());
        }

        if self.queue.capacity == 0 {
            warnings.push("queue.capacity is 0; a capacity of 1 will be used".into());
        }

        if self.status.retain_finished == 0 {
            warnings.push("status.retain_finished is 0; finished jobs cannot be queried".into());
        }

        if self.fetch.max_concurrent == 0 {
            warnings.push("fetch.max_concurrent is 0; sources will be fetched one by one".into());
        }

        if self.fetch.allowed_schemes.is_empty() {
            warnings.push("fetch.allowed_schemes is empty; every job will fail with no valid inputs".into());
        }

        for (name, secs) in [
            ("fetch.timeout_secs", self.fetch.timeout_secs),
            ("transform.timeout_secs", self.transform.timeout_secs),
            ("notify.timeout_secs", self.notify.timeout_secs),
        ] {
            if secs == 0 {
                warnings.push(format!("{name} is 0; requests will time out immediately"));
            }
        }

        if let Err(e) = self.defaults.resolution.parse::<Resolution>() {
            warnings.push(format!("defaults.resolution: {e}"));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

/// Shared workspace storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; one subdirectory per job id lives beneath it.
    pub root: PathBuf,
    /// Extension of the output artifact (also selects the ffmpeg muxer).
    pub output_extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/data"),
            output_extension: "mp4".into(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of jobs executing at once.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: 2 }
    }
}

/// In-process queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of deliveries waiting to be received.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Job status store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Finished job records kept for status queries; the oldest are evicted.
    pub retain_finished: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            retain_finished: 1000,
        }
    }
}

/// Source download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Maximum number of sources of one job downloaded in parallel.
    pub max_concurrent: usize,
    /// URL schemes the fetcher will download; anything else is skipped.
    pub allowed_schemes: Vec<String>,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_concurrent: 4,
            allowed_schemes: vec!["http".into(), "https".into()],
        }
    }
}

/// Transformation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub timeout_secs: u64,
}

impl TransformConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self { timeout_secs: 3600 }
    }
}

/// Callback delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub timeout_secs: u64,
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Per-job-type defaults applied beneath caller-supplied options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeDefaults {
    /// Resize target used when a job omits `resolution`.
    pub resolution: String,
    /// Engine output options for merge jobs.
    pub merge_options: JobOptions,
    /// Engine output options for convert jobs.
    pub convert_options: JobOptions,
}

impl Default for RecipeDefaults {
    fn default() -> Self {
        Self {
            resolution: "1920x1080".into(),
            merge_options: JobOptions::new(),
            convert_options: JobOptions::new(),
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}
