//! Axum router construction.

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::jobs::submit_job,
        routes::jobs::get_job,
        routes::jobs::list_jobs,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::jobs::SubmitJobRequest,
        routes::jobs::SubmitJobResponse,
        routes::jobs::JobResponse,
        routes::jobs::JobResultResponse,
    ))
)]
struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let api = Router::new()
        .route("/jobs", get(routes::jobs::list_jobs))
        .route("/jobs/process-media", post(routes::jobs::submit_job))
        .route("/jobs/{id}", get(routes::jobs::get_job));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
