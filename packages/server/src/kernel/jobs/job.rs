//! Search job record and its state machine.
//!
//! ```text
//! pending ──► processing ──► complete
//!                      └───► error
//! ```
//!
//! A cache hit skips straight to `complete`. Terminal states never change.
//! Each job has exactly one writer (its orchestrator run); pollers and stream
//! subscribers only read.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::events::{JobEvent, JobEventKind};
use crate::common::{NormalizedSearch, ResultMeta, SearchOutcome};
use crate::kernel::stream_hub::{StreamHub, Subscription};

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

// ============================================================================
// Job Model
// ============================================================================

/// One delivered slice: sequence number plus its range in `collected_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub sequence: u64,
    pub start: usize,
    pub len: usize,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    updated_at: DateTime<Utc>,
    outcome: Option<Arc<SearchOutcome>>,
    error: Option<String>,
    collected_items: Vec<Value>,
    chunks: Vec<ChunkRecord>,
}

pub struct SearchJob {
    pub id: Uuid,
    pub request: NormalizedSearch,
    pub cache_key: String,
    pub created_at: DateTime<Utc>,
    pub cache_hit: bool,
    state: Mutex<JobState>,
    hub: StreamHub<JobEvent>,
}

impl fmt::Debug for SearchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchJob")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("cache_key", &self.cache_key)
            .field("cache_hit", &self.cache_hit)
            .finish()
    }
}

impl SearchJob {
    /// A fresh job waiting for admission.
    pub fn new(request: NormalizedSearch, cache_key: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            cache_key,
            created_at: now,
            cache_hit: false,
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                updated_at: now,
                outcome: None,
                error: None,
                collected_items: Vec::new(),
                chunks: Vec::new(),
            }),
            hub: StreamHub::new(),
        }
    }

    /// A job synthesized from a cache hit: already complete, with a single
    /// `complete` event in its log.
    pub fn from_cache(
        request: NormalizedSearch,
        cache_key: String,
        outcome: Arc<SearchOutcome>,
        now: DateTime<Utc>,
    ) -> Self {
        let job = Self {
            cache_hit: true,
            ..Self::new(request, cache_key, now)
        };
        {
            let mut state = job.lock();
            state.status = JobStatus::Complete;
            state.outcome = Some(outcome.clone());
        }
        job.hub.publish(job.complete_event(&outcome));
        job
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.lock().updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn outcome(&self) -> Option<Arc<SearchOutcome>> {
        self.lock().outcome.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn collected_items(&self) -> Vec<Value> {
        self.lock().collected_items.clone()
    }

    pub fn chunks(&self) -> Vec<ChunkRecord> {
        self.lock().chunks.clone()
    }

    // ------------------------------------------------------------------------
    // Transitions (single writer)
    // ------------------------------------------------------------------------

    fn transition(
        &self,
        state: &mut JobState,
        from: JobStatus,
        to: JobStatus,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        if state.status != from {
            return Err(JobError::InvalidTransition {
                from: state.status,
                to,
            });
        }
        state.status = to;
        state.updated_at = now;
        Ok(())
    }

    /// Announce the job as queued. Publishes a `pending` status event.
    pub fn announce_queued(&self) {
        self.hub.publish(JobEvent::new(
            self.id,
            JobEventKind::Status {
                status: JobStatus::Pending,
                message: "Queued".to_string(),
            },
        ));
    }

    /// `pending → processing`.
    pub fn begin(&self, now: DateTime<Utc>) -> Result<(), JobError> {
        {
            let mut state = self.lock();
            self.transition(&mut state, JobStatus::Pending, JobStatus::Processing, now)?;
        }
        self.hub.publish(JobEvent::new(
            self.id,
            JobEventKind::Status {
                status: JobStatus::Processing,
                message: "Fetching issues".to_string(),
            },
        ));
        Ok(())
    }

    /// Record and publish the next chunk. Returns its sequence number.
    pub fn deliver_chunk(
        &self,
        chunk: Vec<Value>,
        remaining: usize,
        now: DateTime<Utc>,
    ) -> Result<u64, JobError> {
        let sequence = {
            let mut state = self.lock();
            if state.status != JobStatus::Processing {
                return Err(JobError::InvalidTransition {
                    from: state.status,
                    to: JobStatus::Processing,
                });
            }

            let sequence = state.chunks.len() as u64 + 1;
            let start = state.collected_items.len();
            state.collected_items.extend(chunk.iter().cloned());
            state.chunks.push(ChunkRecord {
                sequence,
                start,
                len: chunk.len(),
            });
            state.updated_at = now;
            sequence
        };

        self.hub.publish(JobEvent::new(
            self.id,
            JobEventKind::IssuesChunk {
                sequence,
                chunk,
                remaining,
            },
        ));
        Ok(sequence)
    }

    /// `processing → complete`.
    pub fn complete(&self, outcome: Arc<SearchOutcome>, now: DateTime<Utc>) -> Result<(), JobError> {
        {
            let mut state = self.lock();
            self.transition(&mut state, JobStatus::Processing, JobStatus::Complete, now)?;
            state.outcome = Some(outcome.clone());
        }
        self.hub.publish(self.complete_event(&outcome));
        Ok(())
    }

    /// `processing → error`.
    pub fn fail(&self, message: impl Into<String>, now: DateTime<Utc>) -> Result<(), JobError> {
        let message = message.into();
        {
            let mut state = self.lock();
            self.transition(&mut state, JobStatus::Processing, JobStatus::Error, now)?;
            state.error = Some(message.clone());
        }
        self.hub.publish(JobEvent::new(
            self.id,
            JobEventKind::Error {
                status: JobStatus::Error,
                message,
            },
        ));
        Ok(())
    }

    fn complete_event(&self, outcome: &SearchOutcome) -> JobEvent {
        JobEvent::new(
            self.id,
            JobEventKind::Complete {
                status: JobStatus::Complete,
                total_issues: outcome.total_issues(),
                meta: outcome.meta.clone(),
                data: outcome.data.clone(),
                cache_hit: self.cache_hit,
            },
        )
    }

    // ------------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------------

    pub fn subscribe(&self) -> Subscription<JobEvent> {
        self.hub.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn history(&self) -> Vec<Arc<JobEvent>> {
        self.hub.history()
    }

    /// Terminal, unwatched, and last touched more than `retention` ago.
    pub fn is_reapable(&self, now: DateTime<Utc>, retention: TimeDelta) -> bool {
        let (terminal, updated_at) = {
            let state = self.lock();
            (state.status.is_terminal(), state.updated_at)
        };
        terminal && now - updated_at > retention && self.subscriber_count() == 0
    }

    /// Poll payload for the current state.
    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock();
        let body = match state.status {
            JobStatus::Pending | JobStatus::Processing => SnapshotBody::InProgress {
                items: state.collected_items.clone(),
                chunks_delivered: state.chunks.len(),
            },
            JobStatus::Complete => match &state.outcome {
                Some(outcome) => SnapshotBody::Complete {
                    total_issues: outcome.total_issues(),
                    meta: outcome.meta.clone(),
                    data: outcome.data.clone(),
                },
                None => SnapshotBody::Failed {
                    error: "result missing".to_string(),
                },
            },
            JobStatus::Error => SnapshotBody::Failed {
                error: state.error.clone().unwrap_or_default(),
            },
        };

        JobSnapshot {
            job_id: self.id,
            status: state.status,
            cache_hit: self.cache_hit,
            created_at: self.created_at,
            updated_at: state.updated_at,
            body,
        }
    }
}

// ============================================================================
// Poll payload
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: SnapshotBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum SnapshotBody {
    InProgress {
        items: Vec<Value>,
        chunks_delivered: usize,
    },
    Complete {
        total_issues: u64,
        meta: ResultMeta,
        data: Value,
    },
    Failed {
        error: String,
    },
}
