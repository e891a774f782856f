use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

/// Dashboard page served at `/demo`.
pub const DEMO_PAGE: &str = "Demo.html";

/// Serve the dashboard's static assets from `dir`.
///
/// `/demo` maps to the demo page; every other unmatched path is looked up
/// under `dir` and 404s when absent.
pub fn static_routes(dir: &Path) -> Router {
    Router::new()
        .route_service("/demo", ServeFile::new(dir.join(DEMO_PAGE)))
        .fallback_service(ServeDir::new(dir))
}
