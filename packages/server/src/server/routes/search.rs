//! Cached issue search, synchronous and asynchronous.
//!
//! POST /api/jira/search              run one page fetch inline
//! POST /api/jira/search/async        submit a background job
//! GET  /api/jira/search/jobs/:id     poll a job

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::common::{ResultMeta, SearchRequestInput};
use crate::kernel::jobs::{JobSnapshot, JobStatus, Submission};
use crate::server::app::AxumAppState;
use crate::server::errors::{ApiError, ApiResult};

pub(crate) fn poll_url(id: Uuid) -> String {
    format!("/api/jira/search/jobs/{id}")
}

pub(crate) fn stream_url(id: Uuid) -> String {
    format!("/api/jira/search/jobs/{id}/stream")
}

/// Parse a job handle; anything malformed is simply an unknown job.
pub(crate) fn parse_job_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    cache_hit: bool,
    data: Value,
    meta: ResultMeta,
}

pub async fn search_handler(
    Extension(state): Extension<AxumAppState>,
    payload: Result<Json<SearchRequestInput>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(input) = payload?;
    let result = state.orchestrator.search_now(input).await?;

    Ok(Json(SearchResponse {
        cache_hit: result.cache_hit,
        data: result.outcome.data.clone(),
        meta: result.outcome.meta.clone(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSubmission {
    job_id: Uuid,
    status: JobStatus,
    cache_hit: bool,
    data: Value,
    meta: ResultMeta,
    stream_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedSubmission {
    job_id: Uuid,
    status: JobStatus,
    poll_url: String,
    stream_url: String,
}

pub async fn submit_handler(
    Extension(state): Extension<AxumAppState>,
    payload: Result<Json<SearchRequestInput>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(input) = payload?;
    let response = match state.orchestrator.submit(input)? {
        Submission::Cached { job, outcome } => (
            StatusCode::OK,
            Json(CachedSubmission {
                job_id: job.id,
                status: JobStatus::Complete,
                cache_hit: true,
                data: outcome.data.clone(),
                meta: outcome.meta.clone(),
                stream_url: stream_url(job.id),
            }),
        )
            .into_response(),
        Submission::Accepted { job } => (
            StatusCode::ACCEPTED,
            Json(AcceptedSubmission {
                job_id: job.id,
                status: JobStatus::Pending,
                poll_url: poll_url(job.id),
                stream_url: stream_url(job.id),
            }),
        )
            .into_response(),
    };

    Ok(response)
}

pub async fn poll_handler(
    Extension(state): Extension<AxumAppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = parse_job_id(&raw_id)
        .and_then(|id| state.orchestrator.job(id))
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(job.snapshot()))
}
