//! Plain relays to Jira used by the dashboard pages.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use jira::{ProjectVersion, DASHBOARD_FIELDS};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::server::app::AxumAppState;
use crate::server::errors::{ApiError, ApiResult};

const DEFAULT_PROJECT: &str = "CTL-Fix";
const DASHBOARD_MAX_RESULTS: u32 = 100;

#[derive(Deserialize)]
pub struct DashboardSearchQuery {
    jql: Option<String>,
}

/// GET /search?jql=...
pub async fn dashboard_search_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<DashboardSearchQuery>,
) -> ApiResult<Json<Value>> {
    let jql = query
        .jql
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("JQL query parameter is required"))?;

    tracing::debug!(jql = %jql, "dashboard search");

    let body = json!({
        "jql": jql,
        "maxResults": DASHBOARD_MAX_RESULTS,
        "fields": DASHBOARD_FIELDS,
    });

    let data = state
        .tracker
        .search_raw(body)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(data))
}

/// GET /issue/:key
pub async fn issue_handler(
    Extension(state): Extension<AxumAppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Value>> {
    let issue = state.tracker.issue(&key).await.map_err(ApiError::upstream)?;

    if let Some(fields) = issue.get("fields").and_then(Value::as_object) {
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        tracing::debug!(issue = %key, fields = ?keys, "issue fetched");
    }

    Ok(Json(issue))
}

#[derive(Deserialize)]
pub struct FixVersionsQuery {
    project: Option<String>,
}

/// GET /fixversions?project=KEY
pub async fn fix_versions_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<FixVersionsQuery>,
) -> ApiResult<Json<Vec<ProjectVersion>>> {
    let project = query
        .project
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string());

    let versions = state
        .tracker
        .project_versions(&project)
        .await
        .map_err(ApiError::upstream)?;

    tracing::debug!(project = %project, count = versions.len(), "fix versions fetched");
    Ok(Json(versions))
}

/// GET /api/jira/field-metadata
pub async fn field_metadata_handler(
    Extension(state): Extension<AxumAppState>,
) -> ApiResult<Json<Value>> {
    let fields = state
        .tracker
        .field_metadata()
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(fields))
}
