//! Asynchronous search jobs.
//!
//! ```text
//! POST /api/jira/search/async
//!     │
//!     └─► SearchOrchestrator.submit()
//!             ├─► cache hit  → SearchJob::from_cache (complete immediately)
//!             └─► cache miss → AdmissionQueue.submit()
//!                     └─► execute: begin → fetch page → issuesChunk* → complete | error
//!                             └─► AdmissionQueue.release() → next waiting job
//!
//! Reaper (interval)
//!     ├─► purge expired cache entries
//!     └─► drop terminal, unwatched jobs past retention
//! ```
//!
//! Every job owns a replaying [`StreamHub`](crate::kernel::StreamHub), so a
//! subscriber that connects late still receives the full event history.

pub mod events;
mod job;
mod orchestrator;
mod queue;
mod reaper;

pub use events::{JobEvent, JobEventKind};
pub use job::{ChunkRecord, JobError, JobSnapshot, JobStatus, SearchJob, SnapshotBody};
pub use orchestrator::{
    JobCounts, OrchestratorConfig, OrchestratorStats, SearchError, SearchOrchestrator,
    Submission, SyncSearch,
};
pub use queue::{AdmissionQueue, QueueStats};
pub use reaper::{Reaper, SweepStats};
