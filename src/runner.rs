//! One-shot execution of a job descriptor file, outside the queue.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mf_av::TransformEngine;
use mf_core::config::Config;
use mf_core::{JobDescriptor, JobId, JobSubmission};
use mf_pipeline::{JobExecutor, JobRun};

/// Read a submission document (`{"type", "sources", "options",
/// "webhook_url"}`) and turn it into a descriptor with a fresh id.
pub fn read_descriptor(path: &Path) -> Result<JobDescriptor> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {}", path.display()))?;
    let submission: JobSubmission = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse job file {}", path.display()))?;
    Ok(submission.into_descriptor(JobId::new())?)
}

/// Run the job described in `path` to its terminal state.
///
/// A failed job is not an error here; inspect the returned run's outcome.
pub async fn run_file(
    config: &Config,
    engine: Arc<dyn TransformEngine>,
    path: &Path,
) -> Result<JobRun> {
    let job = read_descriptor(path)?;
    tracing::info!(job_id = %job.id, job_type = %job.job_type, "Running job");

    let executor = JobExecutor::from_config(config, engine);
    Ok(executor.execute(&job).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::JobType;

    #[test]
    fn read_descriptor_assigns_id_and_normalizes_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(
            &path,
            r#"{"type": "image_resize", "sources": ["http://a/x.png"], "options": {"resolution": "320x240"}}"#,
        )
        .unwrap();

        let job = read_descriptor(&path).unwrap();
        assert_eq!(job.job_type, JobType::Resize);
        assert_eq!(job.sources, vec!["http://a/x.png".to_string()]);
        assert_eq!(job.options["resolution"], "320x240");
    }

    #[test]
    fn read_descriptor_rejects_empty_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"{"type": "merge", "sources": []}"#).unwrap();
        assert!(read_descriptor(&path).is_err());
    }
}
