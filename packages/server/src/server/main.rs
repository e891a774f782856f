// Main entry point for the release dashboard proxy

use std::sync::Arc;

use anyhow::{Context, Result};
use jira::{JiraClient, JiraOptions};
use proxy_core::kernel::jobs::{Reaper, SearchOrchestrator};
use proxy_core::kernel::{JiraAdapter, SystemClock};
use proxy_core::server::{build_app, AxumAppState};
use proxy_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,proxy_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting release dashboard proxy");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(jira = %config.jira_base_url, "Configuration loaded");

    let client = JiraClient::new(JiraOptions {
        base_url: config.jira_base_url.clone(),
        username: config.jira_username.clone(),
        api_token: config.jira_api_token.clone(),
        timeout: config.jira_timeout,
    })
    .context("Failed to create Jira client")?;
    let jira = JiraAdapter::new(Arc::new(client));

    let orchestrator = SearchOrchestrator::new(
        config.orchestrator(),
        Arc::new(jira.clone()),
        Arc::new(SystemClock),
    );

    // Background sweep of finished jobs and expired cache entries
    Reaper::new(orchestrator.clone()).spawn();

    let app = build_app(
        AxumAppState {
            orchestrator,
            tracker: Arc::new(jira),
        },
        &config.static_dir,
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Dashboard: http://localhost:{}/demo", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
