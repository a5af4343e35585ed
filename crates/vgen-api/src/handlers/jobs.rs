//! Generation job handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use vgen_models::{GenerationRequest, JobAccepted, JobId, JobStatusView};
use vgen_worker::JobStats;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

/// Accept a generation request.
///
/// Credits are reserved before this returns; generation continues in the
/// background and is observed through `GET /api/jobs/:job_id`.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let accepted = state.service.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let view = state.service.status(&JobId::from_string(job_id)).await?;
    Ok(Json(view))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let id = JobId::from_string(job_id);
    let cancelled = state.service.cancel(&id).await?;
    info!(job_id = %id, cancelled, "Cancel requested via API");

    Ok(Json(CancelResponse {
        job_id: id.to_string(),
        cancelled,
    }))
}

pub async fn get_stats(State(state): State<AppState>) -> Json<JobStats> {
    Json(state.service.stats().await)
}
