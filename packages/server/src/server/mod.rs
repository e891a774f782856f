// HTTP server setup (Axum + SSE)
pub mod app;
pub mod errors;
pub mod routes;
pub mod static_files;

pub use app::*;
pub use errors::*;
