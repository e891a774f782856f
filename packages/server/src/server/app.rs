//! Application setup and server configuration.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Extension, Request},
    http::{
        header::{CACHE_CONTROL, EXPIRES, PRAGMA},
        HeaderValue, Method,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::jobs::SearchOrchestrator;
use crate::kernel::BaseIssueTracker;
use crate::server::routes::{
    dashboard_search_handler, field_metadata_handler, fix_versions_handler, health_handler,
    issue_handler, poll_handler, search_handler, stream_handler, submit_handler,
};
use crate::server::static_files::static_routes;

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub orchestrator: SearchOrchestrator,
    pub tracker: Arc<dyn BaseIssueTracker>,
}

/// Disable client and proxy caching on every response.
async fn no_cache_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    response
}

/// Build the Axum application router
pub fn build_app(state: AxumAppState, static_dir: &Path) -> Router {
    // CORS configuration - the dashboard may be opened from any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        // Dashboard relays
        .route("/search", get(dashboard_search_handler))
        .route("/issue/:key", get(issue_handler))
        .route("/fixversions", get(fix_versions_handler))
        .route("/api/jira/field-metadata", get(field_metadata_handler))
        // Cached search
        .route("/api/jira/search", post(search_handler))
        .route("/api/jira/search/async", post(submit_handler))
        .route("/api/jira/search/jobs/:id", get(poll_handler))
        .route("/api/jira/search/jobs/:id/stream", get(stream_handler))
        .route("/health", get(health_handler))
        // Static dashboard pages
        .merge(static_routes(static_dir))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(no_cache_headers))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
