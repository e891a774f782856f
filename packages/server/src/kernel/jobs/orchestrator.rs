//! Asynchronous search orchestrator.
//!
//! Owns the job table, the result cache and the admission queue, and drives
//! each admitted job through one remote fetch:
//!
//! ```text
//! submit(request)
//!     │
//!     ├─► cache hit ──► synthesize complete job (single event)
//!     │
//!     └─► miss ──► pending job ──► AdmissionQueue
//!                                      │ (≤ max_concurrency)
//!                                      ▼
//!                          processing ──► fetch page
//!                                      ├─► issuesChunk × n ──► complete ──► cache
//!                                      └─► error
//!                                      │
//!                                      └─► release slot ──► admit next
//! ```
//!
//! Fetch failures never escape a job: they become its terminal `error` event.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::TimeDelta;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::queue::{AdmissionQueue, QueueStats};
use super::{JobEvent, JobStatus, SearchJob};
use crate::common::{SearchLimits, SearchOutcome, SearchRequestInput, ValidationError};
use crate::kernel::search_cache::SearchCache;
use crate::kernel::stream_hub::Subscription;
use crate::kernel::{BaseClock, BaseIssueSearch};

/// Orchestrator tunables.
#[derive(Debug, Clone, TypedBuilder)]
pub struct OrchestratorConfig {
    /// Jobs allowed to have a remote fetch in flight at once
    #[builder(default = 3)]
    pub max_concurrency: usize,
    /// Issues per `issuesChunk` event
    #[builder(default = 50)]
    pub chunk_size: usize,
    #[builder(default = 100)]
    pub default_page_size: u32,
    #[builder(default = 1000)]
    pub max_page_size: u32,
    #[builder(default = Duration::from_secs(300))]
    pub cache_ttl: Duration,
    /// How long a finished, unwatched job stays pollable
    #[builder(default = Duration::from_secs(600))]
    pub job_retention: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub reaper_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl OrchestratorConfig {
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0:#}")]
    Remote(anyhow::Error),
}

/// Result of an async submission.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Served from cache; the job is already complete.
    Cached {
        job: Arc<SearchJob>,
        outcome: Arc<SearchOutcome>,
    },
    /// Queued for execution.
    Accepted { job: Arc<SearchJob> },
}

impl Submission {
    pub fn job(&self) -> &Arc<SearchJob> {
        match self {
            Submission::Cached { job, .. } | Submission::Accepted { job } => job,
        }
    }
}

/// Result of a synchronous search.
#[derive(Debug, Clone)]
pub struct SyncSearch {
    pub outcome: Arc<SearchOutcome>,
    pub cache_hit: bool,
}

/// Job counts by status plus queue and cache sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub error: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStats {
    pub jobs: JobCounts,
    pub queue: QueueStats,
    pub cache_entries: usize,
}

struct Inner {
    config: OrchestratorConfig,
    search: Arc<dyn BaseIssueSearch>,
    clock: Arc<dyn BaseClock>,
    cache: SearchCache<Arc<SearchOutcome>>,
    jobs: RwLock<HashMap<Uuid, Arc<SearchJob>>>,
    queue: AdmissionQueue<Arc<SearchJob>>,
}

/// Process-scoped orchestrator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

impl SearchOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        search: Arc<dyn BaseIssueSearch>,
        clock: Arc<dyn BaseClock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: AdmissionQueue::new(config.max_concurrency),
                cache: SearchCache::new(clock.clone()),
                jobs: RwLock::new(HashMap::new()),
                config,
                search,
                clock,
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Submit a search for background execution.
    ///
    /// Must be called from within a Tokio runtime: admitted jobs are spawned.
    pub fn submit(&self, input: SearchRequestInput) -> Result<Submission, ValidationError> {
        let request = input.normalize(self.inner.config.limits())?;
        let cache_key = request.cache_key();
        let now = self.inner.clock.now();

        if let Some(outcome) = self.inner.cache.get(&cache_key) {
            let job = Arc::new(SearchJob::from_cache(
                request,
                cache_key,
                outcome.clone(),
                now,
            ));
            self.insert(job.clone());
            info!(job_id = %job.id, "search served from cache");
            return Ok(Submission::Cached { job, outcome });
        }

        let job = Arc::new(SearchJob::new(request, cache_key, now));
        self.insert(job.clone());
        job.announce_queued();
        info!(job_id = %job.id, query = %job.request.query, "search job queued");

        if let Some(admitted) = self.inner.queue.submit(job.clone()) {
            self.launch(admitted);
        }

        Ok(Submission::Accepted { job })
    }

    /// Run a search inline, going through the same cache as async jobs.
    pub async fn search_now(&self, input: SearchRequestInput) -> Result<SyncSearch, SearchError> {
        let request = input.normalize(self.inner.config.limits())?;
        let cache_key = request.cache_key();

        if let Some(outcome) = self.inner.cache.get(&cache_key) {
            debug!(query = %request.query, "synchronous search served from cache");
            return Ok(SyncSearch {
                outcome,
                cache_hit: true,
            });
        }

        let page = self
            .inner
            .search
            .search_page(&request.to_params())
            .await
            .map_err(SearchError::Remote)?;
        let outcome = Arc::new(
            SearchOutcome::from_page(&page).map_err(|e| SearchError::Remote(e.into()))?,
        );

        self.inner
            .cache
            .set(cache_key, outcome.clone(), self.inner.config.cache_ttl);

        Ok(SyncSearch {
            outcome,
            cache_hit: false,
        })
    }

    pub fn job(&self, id: Uuid) -> Option<Arc<SearchJob>> {
        self.inner
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Attach to a job's event stream (replay, then live).
    pub fn subscribe(&self, id: Uuid) -> Option<Subscription<JobEvent>> {
        self.job(id).map(|job| job.subscribe())
    }

    pub fn stats(&self) -> OrchestratorStats {
        let mut jobs = JobCounts::default();
        for job in self
            .inner
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
        {
            jobs.total += 1;
            match job.status() {
                JobStatus::Pending => jobs.pending += 1,
                JobStatus::Processing => jobs.processing += 1,
                JobStatus::Complete => jobs.complete += 1,
                JobStatus::Error => jobs.error += 1,
            }
        }

        OrchestratorStats {
            jobs,
            queue: self.inner.queue.stats(),
            cache_entries: self.inner.cache.len(),
        }
    }

    /// Remove jobs that are terminal, unwatched and older than the retention
    /// window. Candidates are collected under a read lock and re-checked
    /// under the write lock, so concurrent submissions are never blocked for
    /// the whole scan.
    pub fn reap_jobs(&self) -> usize {
        let now = self.inner.clock.now();
        let retention = TimeDelta::from_std(self.inner.config.job_retention).unwrap_or(TimeDelta::MAX);

        let candidates: Vec<Uuid> = self
            .inner
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|job| job.is_reapable(now, retention))
            .map(|job| job.id)
            .collect();

        if candidates.is_empty() {
            return 0;
        }

        let mut jobs = self.inner.jobs.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for id in candidates {
            let still_reapable = jobs
                .get(&id)
                .is_some_and(|job| job.is_reapable(now, retention));
            if still_reapable {
                jobs.remove(&id);
                removed += 1;
            }
        }
        removed
    }

    /// Drop expired cache entries.
    pub fn purge_cache(&self) -> usize {
        self.inner.cache.purge_expired()
    }

    fn insert(&self, job: Arc<SearchJob>) {
        self.inner
            .jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id, job);
    }

    /// Run an admitted job, then hand its slot to the next waiting job.
    /// The slot is released even if the run panics.
    fn launch(&self, job: Arc<SearchJob>) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let run = AssertUnwindSafe(orchestrator.execute(&job))
                .catch_unwind()
                .await;
            if run.is_err() {
                error!(job_id = %job.id, "search job panicked");
                let now = orchestrator.inner.clock.now();
                if let Err(e) = job.fail("Search task failed unexpectedly", now) {
                    warn!(job_id = %job.id, error = %e, "could not record job failure");
                }
            }
            if let Some(next) = orchestrator.inner.queue.release() {
                orchestrator.launch(next);
            }
        });
    }

    async fn execute(&self, job: &SearchJob) {
        let clock = &self.inner.clock;

        if let Err(e) = job.begin(clock.now()) {
            warn!(job_id = %job.id, error = %e, "search job not startable");
            return;
        }
        info!(job_id = %job.id, "search job processing");

        let fetched = self
            .inner
            .search
            .search_page(&job.request.to_params())
            .await
            .and_then(|page| Ok((SearchOutcome::from_page(&page)?, page)));

        let (outcome, page) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "search job failed");
                if let Err(e) = job.fail(format!("{e:#}"), clock.now()) {
                    warn!(job_id = %job.id, error = %e, "could not record job failure");
                }
                return;
            }
        };

        let total = page.issues.len();
        let mut delivered = 0;
        for chunk in page.issues.chunks(self.inner.config.chunk_size.max(1)) {
            delivered += chunk.len();
            match job.deliver_chunk(chunk.to_vec(), total - delivered, clock.now()) {
                Ok(sequence) => {
                    debug!(job_id = %job.id, sequence, size = chunk.len(), "issues chunk delivered")
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "could not deliver chunk");
                    return;
                }
            }
            // Let subscribers and pollers observe progress between chunks.
            tokio::task::yield_now().await;
        }

        let outcome = Arc::new(outcome);
        self.inner.cache.set(
            job.cache_key.clone(),
            outcome.clone(),
            self.inner.config.cache_ttl,
        );

        match job.complete(outcome, clock.now()) {
            Ok(()) => info!(job_id = %job.id, total_issues = total, "search job complete"),
            Err(e) => warn!(job_id = %job.id, error = %e, "could not complete job"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::JobEventKind;
    use crate::kernel::test_dependencies::{page_of, settle, ManualClock, MockIssueSearch};
    use serde_json::json;

    fn orchestrator(search: Arc<MockIssueSearch>, config: OrchestratorConfig) -> SearchOrchestrator {
        SearchOrchestrator::new(config, search, Arc::new(ManualClock::default()))
    }

    fn request(jql: &str) -> SearchRequestInput {
        serde_json::from_value(json!({"jql": jql})).unwrap()
    }

    async fn drain(job: &SearchJob) -> Vec<Arc<JobEvent>> {
        let mut sub = job.subscribe();
        let mut events = Vec::new();
        while let Some(event) = sub.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_chunks_are_sequenced_and_complete_is_last() {
        let search = Arc::new(MockIssueSearch::with_page(page_of(120)));
        let orch = orchestrator(search, OrchestratorConfig::builder().chunk_size(50).build());

        let submission = orch.submit(request("project = CTL")).unwrap();
        let job = submission.job().clone();
        assert!(matches!(submission, Submission::Accepted { .. }));

        let events = drain(&job).await;
        let chunks: Vec<(u64, usize, usize)> = events
            .iter()
            .filter_map(|e| match &e.kind {
                JobEventKind::IssuesChunk {
                    sequence,
                    chunk,
                    remaining,
                } => Some((*sequence, chunk.len(), *remaining)),
                _ => None,
            })
            .collect();

        assert_eq!(chunks, vec![(1, 50, 70), (2, 50, 20), (3, 20, 0)]);
        assert_eq!(events.iter().filter(|e| e.complete).count(), 1);
        assert!(events.last().unwrap().complete);
        assert_eq!(job.status(), JobStatus::Complete);
        assert_eq!(job.collected_items().len(), 120);
    }

    #[tokio::test]
    async fn test_event_order_for_successful_job() {
        let search = Arc::new(MockIssueSearch::with_page(page_of(3)));
        let orch = orchestrator(search, OrchestratorConfig::default());

        let job = orch.submit(request("x")).unwrap().job().clone();
        let types: Vec<&str> = drain(&job).await.iter().map(|e| e.event_type()).collect();

        assert_eq!(types, vec!["status", "status", "issuesChunk", "complete"]);
    }

    #[tokio::test]
    async fn test_resubmission_after_completion_is_cache_hit() {
        let search = Arc::new(MockIssueSearch::with_page(page_of(5)));
        let orch = orchestrator(search.clone(), OrchestratorConfig::default());

        let first = orch.submit(request("project = CTL")).unwrap().job().clone();
        drain(&first).await;
        let populated = first.outcome().unwrap();

        match orch.submit(request("  project = CTL ")).unwrap() {
            Submission::Cached { job, outcome } => {
                assert_eq!(*outcome, *populated);
                assert!(job.cache_hit);
                assert_ne!(job.id, first.id);
                assert_eq!(job.history().len(), 1);
            }
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert_eq!(search.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_publishes_error_and_skips_cache() {
        let search = Arc::new(MockIssueSearch::with_page(page_of(2)));
        search.push_error("Jira returned 400");
        let orch = orchestrator(search.clone(), OrchestratorConfig::default());

        let job = orch.submit(request("bad jql")).unwrap().job().clone();
        let events = drain(&job).await;

        match &events.last().unwrap().kind {
            JobEventKind::Error { message, .. } => assert!(message.contains("Jira returned 400")),
            other => panic!("expected error event, got {other:?}"),
        }
        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(orch.stats().cache_entries, 0);

        let retry = orch.submit(request("bad jql")).unwrap();
        assert!(matches!(retry, Submission::Accepted { .. }));
        drain(retry.job()).await;
        assert_eq!(retry.job().status(), JobStatus::Complete);
    }

    #[tokio::test]
    async fn test_concurrency_cap_and_fifo_admission() {
        let search = Arc::new(MockIssueSearch::gated(page_of(1)));
        let orch = orchestrator(
            search.clone(),
            OrchestratorConfig::builder().max_concurrency(2).build(),
        );

        let jobs: Vec<_> = (0..5)
            .map(|i| orch.submit(request(&format!("q{i}"))).unwrap().job().clone())
            .collect();
        settle().await;

        assert_eq!(search.calls().len(), 2);
        assert_eq!(orch.stats().queue.executing, 2);
        assert_eq!(orch.stats().queue.waiting, 3);
        assert_eq!(jobs[2].status(), JobStatus::Pending);

        for _ in 0..5 {
            search.open_gate(1);
            settle().await;
        }
        for job in &jobs {
            drain(job).await;
        }

        let order: Vec<String> = search.calls().into_iter().map(|p| p.jql).collect();
        assert_eq!(order, vec!["q0", "q1", "q2", "q3", "q4"]);
        assert!(search.max_in_flight() <= 2);
        assert_eq!(orch.stats().queue.executing, 0);
        assert!(jobs.iter().all(|j| j.status() == JobStatus::Complete));
    }

    #[tokio::test]
    async fn test_in_flight_duplicates_are_independent_jobs() {
        let search = Arc::new(MockIssueSearch::gated(page_of(1)));
        let orch = orchestrator(search.clone(), OrchestratorConfig::default());

        let a = orch.submit(request("same")).unwrap();
        let b = orch.submit(request("same")).unwrap();

        assert!(matches!(a, Submission::Accepted { .. }));
        assert!(matches!(b, Submission::Accepted { .. }));
        assert_ne!(a.job().id, b.job().id);

        search.open_gate(2);
        drain(a.job()).await;
        drain(b.job()).await;
        assert_eq!(search.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_validation_error_creates_no_job() {
        let orch = orchestrator(
            Arc::new(MockIssueSearch::with_page(page_of(1))),
            OrchestratorConfig::default(),
        );

        let err = orch.submit(SearchRequestInput::default()).unwrap_err();
        assert_eq!(err, ValidationError::MissingQuery);
        assert_eq!(orch.stats().jobs.total, 0);
    }

    #[tokio::test]
    async fn test_search_now_populates_and_reads_cache() {
        let search = Arc::new(MockIssueSearch::with_page(page_of(4)));
        let orch = orchestrator(search.clone(), OrchestratorConfig::default());

        let first = orch.search_now(request("x")).await.unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.outcome.meta.total, 4);

        let second = orch.search_now(request("x")).await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.outcome, first.outcome);
        assert_eq!(search.calls().len(), 1);

        // The async path shares the same cache.
        assert!(matches!(orch.submit(request("x")).unwrap(), Submission::Cached { .. }));
    }

    #[tokio::test]
    async fn test_search_now_remote_error() {
        let search = Arc::new(MockIssueSearch::with_page(page_of(1)));
        search.push_error("timed out");
        let orch = orchestrator(search, OrchestratorConfig::default());

        let err = orch.search_now(request("x")).await.unwrap_err();
        assert!(matches!(err, SearchError::Remote(_)));
        assert_eq!(orch.stats().cache_entries, 0);
    }

    #[tokio::test]
    async fn test_disconnecting_subscriber_does_not_cancel_job() {
        let search = Arc::new(MockIssueSearch::gated(page_of(2)));
        let orch = orchestrator(search.clone(), OrchestratorConfig::default());

        let job = orch.submit(request("x")).unwrap().job().clone();
        let sub = orch.subscribe(job.id).unwrap();
        settle().await;
        drop(sub);

        search.open_gate(1);
        drain(&job).await;
        assert_eq!(job.status(), JobStatus::Complete);
    }

    /// Panics on its first fetch, then serves pages normally.
    struct PanicsOnce {
        calls: std::sync::atomic::AtomicUsize,
        inner: MockIssueSearch,
    }

    #[async_trait::async_trait]
    impl BaseIssueSearch for PanicsOnce {
        async fn search_page(
            &self,
            params: &jira::SearchParams,
        ) -> anyhow::Result<jira::SearchPage> {
            if self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                panic!("search client bug");
            }
            self.inner.search_page(params).await
        }
    }

    #[tokio::test]
    async fn test_panicking_fetch_fails_job_and_frees_slot() {
        let search = Arc::new(PanicsOnce {
            calls: Default::default(),
            inner: MockIssueSearch::with_page(page_of(2)),
        });
        let orch = SearchOrchestrator::new(
            OrchestratorConfig::builder().max_concurrency(1).build(),
            search,
            Arc::new(ManualClock::default()),
        );

        let a = orch.submit(request("a")).unwrap().job().clone();
        let b = orch.submit(request("b")).unwrap().job().clone();

        let events = drain(&a).await;
        match &events.last().unwrap().kind {
            JobEventKind::Error { message, .. } => {
                assert_eq!(message, "Search task failed unexpectedly")
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert_eq!(a.status(), JobStatus::Error);

        drain(&b).await;
        assert_eq!(b.status(), JobStatus::Complete);
        assert_eq!(orch.stats().queue.executing, 0);
        assert_eq!(orch.stats().queue.waiting, 0);
    }

    #[tokio::test]
    async fn test_empty_page_completes_without_chunks() {
        let search = Arc::new(MockIssueSearch::with_page(page_of(0)));
        let orch = orchestrator(search, OrchestratorConfig::default());

        let job = orch.submit(request("x")).unwrap().job().clone();
        let events = drain(&job).await;

        assert!(events.iter().all(|e| e.event_type() != "issuesChunk"));
        match &events.last().unwrap().kind {
            JobEventKind::Complete { total_issues, .. } => assert_eq!(*total_issues, 0),
            other => panic!("expected complete, got {other:?}"),
        }
    }
}
