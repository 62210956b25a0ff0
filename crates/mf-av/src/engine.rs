//! The transformation engine seam.
//!
//! [`TransformEngine`] is what the dispatcher calls to turn a [`Recipe`] into
//! an output file. [`FfmpegEngine`] is the production implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use mf_core::{Error, Result};

use crate::command::ToolCommand;
use crate::recipe::Recipe;
use crate::tools::ToolRegistry;

/// Number of trailing stderr lines kept as the failure diagnostic.
const DIAGNOSTIC_LINES: usize = 5;

/// Something that can execute a [`Recipe`].
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Engine name used in logs.
    fn name(&self) -> &str;

    /// Render `recipe` into `output`.
    ///
    /// An engine must report rejected options or unreadable input as
    /// [`Error::Transform`] with its own diagnostic text.
    async fn render(&self, recipe: &Recipe, output: &Path) -> Result<()>;
}

/// Runs recipes through the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    path: PathBuf,
    timeout: Duration,
}

impl FfmpegEngine {
    pub fn new(path: PathBuf, timeout: Duration) -> Self {
        Self { path, timeout }
    }

    /// Build an engine from the discovered ffmpeg binary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if ffmpeg was not found.
    pub fn from_registry(registry: &ToolRegistry, timeout: Duration) -> Result<Self> {
        let ffmpeg = registry.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone(), timeout))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TransformEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn render(&self, recipe: &Recipe, output: &Path) -> Result<()> {
        let mut cmd = ToolCommand::new(self.path.clone());
        cmd.args(recipe.ffmpeg_args(output)).timeout(self.timeout);

        let out = cmd.output().await?;
        if !out.status.success() {
            let diagnostic = out.stderr_tail(DIAGNOSTIC_LINES);
            let message = if diagnostic.is_empty() {
                format!("ffmpeg exited with status {}", out.status)
            } else {
                diagnostic
            };
            return Err(Error::transform(message));
        }

        if !output.exists() {
            return Err(Error::transform(format!(
                "ffmpeg reported success but produced no file at {}",
                output.display()
            )));
        }

        Ok(())
    }
}
