//! Maps a job type onto a [`Recipe`] and runs it through the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mf_av::{OutputOption, Recipe, TransformEngine};
use mf_core::config::RecipeDefaults;
use mf_core::{Error, JobDescriptor, JobOptions, JobType, Resolution, Result};
use serde_json::Value;

use crate::workspace::WorkspaceManager;

/// Option key holding caller-supplied engine output flags.
pub const ENGINE_OPTIONS_KEY: &str = "ffmpeg_options";
/// Option key holding the resize target.
pub const RESOLUTION_KEY: &str = "resolution";

/// Selects and executes the recipe for a job.
pub struct TransformDispatcher {
    engine: Arc<dyn TransformEngine>,
    defaults: RecipeDefaults,
    timeout: Duration,
}

impl TransformDispatcher {
    pub fn new(
        engine: Arc<dyn TransformEngine>,
        defaults: RecipeDefaults,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            defaults,
            timeout,
        }
    }

    /// Build the recipe for `job` over the fetched `inputs`.
    ///
    /// Merge uses every input in order; resize and convert use only the
    /// first.
    ///
    /// # Errors
    ///
    /// [`Error::Transform`] when options are malformed, and
    /// [`Error::NoValidInputs`] when `inputs` is empty.
    pub fn plan(&self, job: &JobDescriptor, inputs: &[PathBuf]) -> Result<Recipe> {
        let first = inputs.first().ok_or(Error::NoValidInputs)?;

        let recipe = match job.job_type {
            JobType::Merge => Recipe::Concat {
                inputs: inputs.to_vec(),
                options: engine_options(&self.defaults.merge_options, &job.options)?,
            },
            JobType::Resize => Recipe::Scale {
                input: first.clone(),
                resolution: self.resolution(&job.options)?,
                options: Vec::new(),
            },
            JobType::ConvertDefault => Recipe::Encode {
                input: first.clone(),
                options: engine_options(&self.defaults.convert_options, &job.options)?,
            },
        };
        Ok(recipe)
    }

    fn resolution(&self, options: &JobOptions) -> Result<Resolution> {
        match options.get(RESOLUTION_KEY) {
            None | Some(Value::Null) => self.defaults.resolution.parse(),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(Error::transform(format!(
                "resolution must be a \"WxH\" string, got {other}"
            ))),
        }
    }

    /// Run the job's recipe and commit the artifact.
    ///
    /// The engine writes to the workspace's partial path; only a successful
    /// render is renamed onto the final output path, which is returned. On
    /// failure the partial file is removed.
    ///
    /// # Errors
    ///
    /// Planning errors, engine errors, [`Error::Tool`] when the engine
    /// exceeds the timeout, and [`Error::Io`] if the commit fails.
    pub async fn dispatch(
        &self,
        job: &JobDescriptor,
        inputs: &[PathBuf],
        workspace: &WorkspaceManager,
    ) -> Result<PathBuf> {
        let recipe = self.plan(job, inputs)?;
        let partial = workspace.partial_output_path(job.id);
        let output = workspace.output_path(job.id);

        tracing::info!(
            job_id = %job.id,
            recipe = recipe.kind(),
            engine = self.engine.name(),
            inputs = inputs.len(),
            "Dispatching transform"
        );

        let render = self.engine.render(&recipe, &partial);
        let rendered = match tokio::time::timeout(self.timeout, render).await {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::tool(
                self.engine.name(),
                format!("timed out after {:?}", self.timeout),
            )),
        };

        let committed = rendered.and_then(|()| commit(&partial, &output));
        if let Err(e) = committed {
            discard(&partial);
            return Err(e);
        }

        tracing::info!(job_id = %job.id, output = %output.display(), "Transform complete");
        Ok(output)
    }
}

/// Configured defaults overlaid with the job's `ffmpeg_options` object.
fn engine_options(defaults: &JobOptions, options: &JobOptions) -> Result<Vec<OutputOption>> {
    let mut merged = defaults.clone();
    match options.get(ENGINE_OPTIONS_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(_) => {
            return Err(Error::transform(format!(
                "{ENGINE_OPTIONS_KEY} must be a JSON object"
            )));
        }
    }
    OutputOption::from_map(&merged)
}

fn commit(partial: &Path, output: &Path) -> Result<()> {
    std::fs::rename(partial, output)?;
    Ok(())
}

fn discard(partial: &Path) {
    if let Err(e) = std::fs::remove_file(partial) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                file = %partial.display(),
                error = %e,
                "Failed to remove partial output"
            );
        }
    }
}
