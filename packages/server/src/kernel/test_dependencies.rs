// TestDependencies - mock implementations for testing
//
// Provides a scripted issue tracker and a manually driven clock that can be
// injected into the orchestrator and the HTTP app.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jira::{ProjectVersion, SearchPage, SearchParams};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{BaseClock, BaseIssueSearch, BaseIssueTracker};

// =============================================================================
// Manual Clock
// =============================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

impl BaseClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Mock Issue Search / Tracker
// =============================================================================

/// A page of `count` synthetic issues `CTL-0..CTL-{count-1}`.
pub fn page_of(count: usize) -> SearchPage {
    SearchPage {
        issues: (0..count)
            .map(|i| json!({"id": i.to_string(), "key": format!("CTL-{i}")}))
            .collect(),
        start_at: 0,
        max_results: 100,
        total: None,
        next_page_token: None,
        is_last: None,
    }
}

/// Yield enough times for spawned jobs to reach their next await point.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Scripted issue tracker.
///
/// `search_page` pops queued responses first and falls back to the default
/// page. In gated mode each call waits for a permit from `open_gate`, which
/// keeps fetches in flight for as long as a test needs.
pub struct MockIssueSearch {
    default_page: SearchPage,
    responses: Mutex<VecDeque<std::result::Result<SearchPage, String>>>,
    calls: Mutex<Vec<SearchParams>>,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    raw_bodies: Mutex<Vec<Value>>,
    tracker_error: Mutex<Option<String>>,
}

impl MockIssueSearch {
    pub fn with_page(page: SearchPage) -> Self {
        Self {
            default_page: page,
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            raw_bodies: Mutex::new(Vec::new()),
            tracker_error: Mutex::new(None),
        }
    }

    /// Like `with_page`, but every fetch blocks until `open_gate` is called.
    pub fn gated(page: SearchPage) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::with_page(page)
        }
    }

    /// Queue a page to be returned by the next search.
    pub fn push_page(&self, page: SearchPage) {
        self.responses.lock().unwrap().push_back(Ok(page));
    }

    /// Queue a failure for the next search.
    pub fn push_error(&self, message: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Err(message.into()));
    }

    /// Let `n` gated fetches proceed.
    pub fn open_gate(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Make every relay call fail with `message`.
    pub fn fail_tracker(&self, message: impl Into<String>) {
        *self.tracker_error.lock().unwrap() = Some(message.into());
    }

    pub fn calls(&self) -> Vec<SearchParams> {
        self.calls.lock().unwrap().clone()
    }

    pub fn raw_bodies(&self) -> Vec<Value> {
        self.raw_bodies.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn tracker_result(&self) -> Result<()> {
        match self.tracker_error.lock().unwrap().clone() {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BaseIssueSearch for MockIssueSearch {
    async fn search_page(&self, params: &SearchParams) -> Result<SearchPage> {
        self.calls.lock().unwrap().push(params.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        let response = self.responses.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match response {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(SearchPage {
                start_at: params.start_at,
                ..self.default_page.clone()
            }),
        }
    }
}

#[async_trait]
impl BaseIssueTracker for MockIssueSearch {
    async fn search_raw(&self, body: Value) -> Result<Value> {
        self.tracker_result()?;
        self.raw_bodies.lock().unwrap().push(body);
        Ok(serde_json::to_value(&self.default_page)?)
    }

    async fn issue(&self, key: &str) -> Result<Value> {
        self.tracker_result()?;
        Ok(json!({
            "key": key,
            "fields": {"summary": format!("Summary of {key}")},
            "renderedFields": {}
        }))
    }

    async fn project_versions(&self, project: &str) -> Result<Vec<ProjectVersion>> {
        self.tracker_result()?;
        Ok(vec![ProjectVersion {
            id: "10000".to_string(),
            name: format!("{project} 1.0"),
            description: String::new(),
            released: true,
        }])
    }

    async fn field_metadata(&self) -> Result<Value> {
        self.tracker_result()?;
        Ok(json!([{"id": "summary", "name": "Summary", "custom": false}]))
    }
}
