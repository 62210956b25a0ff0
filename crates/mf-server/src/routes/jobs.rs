//! Job submission and status route handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use mf_core::{JobId, JobStatus, JobSubmission};
use mf_pipeline::{CallbackResult, JobRecord};

use crate::context::AppContext;
use crate::error::AppError;

/// Query parameters for listing jobs.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListJobsParams {
    /// Only return jobs with this status (queued, running, completed, failed).
    pub status: Option<String>,
}

/// Request body for submitting a new job.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitJobRequest {
    /// Recipe family: merge, resize or convert-default.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Ordered source URLs.
    pub sources: Vec<String>,
    /// Engine options, e.g. `{"resolution": "640x360"}` or
    /// `{"ffmpeg_options": {"crf": 23}}`.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub options: Option<serde_json::Value>,
    /// URL that receives the outcome as a JSON POST.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl From<SubmitJobRequest> for JobSubmission {
    fn from(req: SubmitJobRequest) -> Self {
        JobSubmission {
            job_type: req.job_type,
            sources: req.sources,
            options: req.options,
            webhook_url: req.webhook_url,
        }
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: String,
}

/// Terminal result of a job.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct JobResultResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Job status response.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct JobResponse {
    pub job_id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: String,
    pub state: Option<String>,
    pub result: Option<JobResultResponse>,
    pub error_code: Option<String>,
    pub retryable: bool,
    pub attempts: u32,
    /// `skipped`, `delivered` or `failed: <reason>`.
    pub callback: Option<String>,
    pub submitted_at: String,
    pub updated_at: String,
}

impl JobResponse {
    fn from_record(record: &JobRecord) -> Self {
        Self {
            job_id: record.id.to_string(),
            job_type: record.job_type.to_string(),
            status: record.status.to_string(),
            state: record.state.map(|s| s.to_string()),
            result: record.outcome.as_ref().map(|o| JobResultResponse {
                status: o.status.to_string(),
                artifact_locator: o.artifact_locator.clone(),
                error: o.error.clone(),
            }),
            error_code: record.error_code.clone(),
            retryable: record.retryable,
            attempts: record.attempts,
            callback: record.callback.as_ref().map(|c| match c {
                CallbackResult::Skipped => "skipped".to_string(),
                CallbackResult::Delivered => "delivered".to_string(),
                CallbackResult::Failed(reason) => format!("failed: {reason}"),
            }),
            submitted_at: record.submitted_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// POST /api/v1/jobs/process-media
#[utoipa::path(
    post,
    path = "/api/v1/jobs/process-media",
    request_body = SubmitJobRequest,
    responses(
        (status = 202, description = "Job queued", body = SubmitJobResponse),
        (status = 400, description = "Malformed submission"),
        (status = 503, description = "Queue unavailable")
    )
)]
pub async fn submit_job(
    State(ctx): State<AppContext>,
    payload: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let record = ctx.submit(payload.into())?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: record.id.to_string(),
            status: record.status.to_string(),
        }),
    ))
}

/// GET /api/v1/jobs/{id}
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job details", body = JobResponse),
        (status = 400, description = "Malformed job ID"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, AppError> {
    let job_id: JobId = id
        .parse()
        .map_err(|_| mf_core::Error::Validation("Invalid job ID".into()))?;

    let record = ctx
        .store
        .get(job_id)
        .ok_or_else(|| mf_core::Error::not_found("job", job_id))?;

    Ok(Json(JobResponse::from_record(&record)))
}

/// GET /api/v1/jobs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    params(ListJobsParams),
    responses(
        (status = 200, description = "List jobs, newest first", body = Vec<JobResponse>),
        (status = 400, description = "Unknown status filter")
    )
)]
pub async fn list_jobs(
    State(ctx): State<AppContext>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    let Query(params) = params?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()?;

    let responses = ctx
        .store
        .list(status)
        .iter()
        .map(JobResponse::from_record)
        .collect();
    Ok(Json(responses))
}
