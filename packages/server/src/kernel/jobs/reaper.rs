//! Periodic sweep of finished jobs and expired cache entries.
//!
//! Runs on its own interval, independent of request traffic. Both sweeps
//! snapshot their collection before removing anything, so they tolerate
//! concurrent submissions and job completions.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::SearchOrchestrator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub jobs_removed: usize,
    pub cache_entries_removed: usize,
}

pub struct Reaper {
    orchestrator: SearchOrchestrator,
    interval: Duration,
}

impl Reaper {
    pub fn new(orchestrator: SearchOrchestrator) -> Self {
        let interval = orchestrator.config().reaper_interval;
        Self {
            orchestrator,
            interval,
        }
    }

    pub fn with_interval(orchestrator: SearchOrchestrator, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Run both sweeps once.
    pub fn sweep(&self) -> SweepStats {
        SweepStats {
            cache_entries_removed: self.orchestrator.purge_cache(),
            jobs_removed: self.orchestrator.reap_jobs(),
        }
    }

    /// Spawn the sweep loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "reaper starting");

            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; nothing is stale at startup.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let stats = self.sweep();
                if stats.jobs_removed > 0 || stats.cache_entries_removed > 0 {
                    info!(
                        jobs_removed = stats.jobs_removed,
                        cache_entries_removed = stats.cache_entries_removed,
                        "reaper sweep"
                    );
                } else {
                    debug!("reaper sweep found nothing to remove");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::common::SearchRequestInput;
    use crate::kernel::jobs::{OrchestratorConfig, SearchJob, Submission};
    use crate::kernel::test_dependencies::{page_of, settle, ManualClock, MockIssueSearch};

    fn setup(search: MockIssueSearch) -> (Arc<ManualClock>, Arc<MockIssueSearch>, SearchOrchestrator) {
        let clock = Arc::new(ManualClock::default());
        let search = Arc::new(search);
        let config = OrchestratorConfig::builder()
            .cache_ttl(Duration::from_secs(300))
            .job_retention(Duration::from_secs(600))
            .build();
        let orch = SearchOrchestrator::new(config, search.clone(), clock.clone());
        (clock, search, orch)
    }

    fn request(jql: &str) -> SearchRequestInput {
        serde_json::from_value(json!({"jql": jql})).unwrap()
    }

    async fn finish(job: &SearchJob) {
        let mut sub = job.subscribe();
        while sub.next().await.is_some() {}
    }

    #[tokio::test]
    async fn test_stale_unwatched_terminal_job_removed() {
        let (clock, _search, orch) = setup(MockIssueSearch::with_page(page_of(3)));
        let job = orch.submit(request("x")).unwrap().job().clone();
        finish(&job).await;

        let reaper = Reaper::new(orch.clone());
        assert_eq!(reaper.sweep().jobs_removed, 0);

        clock.advance(Duration::from_secs(601));
        let stats = reaper.sweep();

        assert_eq!(stats.jobs_removed, 1);
        assert_eq!(stats.cache_entries_removed, 1);
        assert!(orch.job(job.id).is_none());
    }

    #[tokio::test]
    async fn test_watched_terminal_job_retained() {
        let (clock, search, orch) = setup(MockIssueSearch::gated(page_of(1)));
        let search_job = orch.submit(request("x")).unwrap().job().clone();

        // Subscriber attached before completion and not yet drained.
        let _watcher = orch.subscribe(search_job.id).unwrap();
        settle().await;

        let reaper = Reaper::new(orch.clone());
        assert_eq!(reaper.sweep().jobs_removed, 0);

        // Release the fetch and let the job finish.
        let mut other = search_job.subscribe();
        search.open_gate(1);
        while other.next().await.is_some() {}
        assert!(search_job.is_terminal());

        clock.advance(Duration::from_secs(3600));
        assert_eq!(reaper.sweep().jobs_removed, 0);
        assert!(orch.job(search_job.id).is_some());
    }

    #[tokio::test]
    async fn test_in_flight_job_never_removed() {
        let (clock, _search, orch) = setup(MockIssueSearch::gated(page_of(1)));
        let job = orch.submit(request("x")).unwrap().job().clone();
        settle().await;

        clock.advance(Duration::from_secs(3600));
        assert_eq!(Reaper::new(orch.clone()).sweep().jobs_removed, 0);
        assert!(orch.job(job.id).is_some());
    }

    #[tokio::test]
    async fn test_cache_hit_jobs_are_reaped_too() {
        let (clock, _search, orch) = setup(MockIssueSearch::with_page(page_of(1)));
        let first = orch.submit(request("x")).unwrap().job().clone();
        finish(&first).await;

        let cached = orch.submit(request("x")).unwrap();
        assert!(matches!(cached, Submission::Cached { .. }));

        clock.advance(Duration::from_secs(601));
        assert_eq!(Reaper::new(orch.clone()).sweep().jobs_removed, 2);
        assert_eq!(orch.stats().jobs.total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_reaper_sweeps_on_interval() {
        let (clock, _search, orch) = setup(MockIssueSearch::with_page(page_of(1)));
        let job = orch.submit(request("x")).unwrap().job().clone();
        finish(&job).await;
        clock.advance(Duration::from_secs(601));

        let handle = Reaper::with_interval(orch.clone(), Duration::from_secs(60)).spawn();
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;

        assert!(orch.job(job.id).is_none());
        handle.abort();
    }
}
