// Release Dashboard Proxy - API Core
//
// Relays the dashboard's requests to Jira and runs large issue searches as
// background jobs whose progress is streamed to clients over SSE.

pub mod common;
pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
