//! Test harness: the real router wired to a scripted Jira double.
//!
//! Requests go through `tower::ServiceExt::oneshot`, so no socket is bound.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use jira::SearchPage;
use proxy_core::kernel::jobs::{OrchestratorConfig, SearchOrchestrator};
use proxy_core::kernel::{ManualClock, MockIssueSearch};
use proxy_core::server::{build_app, AxumAppState};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestHarness {
    pub app: Router,
    pub orchestrator: SearchOrchestrator,
    pub search: Arc<MockIssueSearch>,
    pub clock: Arc<ManualClock>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("response body is JSON")
    }
}

impl TestHarness {
    pub fn new(search: MockIssueSearch) -> Self {
        Self::with_config(search, OrchestratorConfig::default())
    }

    pub fn with_page(page: SearchPage) -> Self {
        Self::new(MockIssueSearch::with_page(page))
    }

    pub fn with_config(search: MockIssueSearch, config: OrchestratorConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let search = Arc::new(search);
        let clock = Arc::new(ManualClock::default());
        let orchestrator = SearchOrchestrator::new(config, search.clone(), clock.clone());

        let app = build_app(
            AxumAppState {
                orchestrator: orchestrator.clone(),
                tracker: search.clone(),
            },
            &static_dir(),
        );

        Self {
            app,
            orchestrator,
            search,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST an arbitrary body, optionally without a content type.
    pub async fn post_raw(&self, uri: &str, content_type: Option<&str>, body: &str) -> TestResponse {
        let mut request = Request::post(uri);
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Block until the job has published its terminal event.
    pub async fn wait_for_job(&self, id: Uuid) {
        let mut subscription = self
            .orchestrator
            .subscribe(id)
            .expect("job exists");
        while subscription.next().await.is_some() {}
    }
}

pub fn static_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/static")
}

/// Parse an SSE body into `(event name, JSON data)` pairs. Comment lines
/// (keep-alives) are skipped.
pub fn parse_sse(body: &str) -> Vec<(String, Value)> {
    let mut events = Vec::new();
    let mut name = String::from("message");

    for line in body.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            name = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            let data = serde_json::from_str(value.trim()).expect("SSE data is JSON");
            events.push((name.clone(), data));
        } else if line.is_empty() {
            name = String::from("message");
        }
    }

    events
}

pub fn job_id(body: &Value) -> Uuid {
    body["jobId"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("response carries a jobId")
}
