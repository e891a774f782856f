use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::JobStatus;
use crate::common::ResultMeta;
use crate::kernel::stream_hub::HubEvent;

/// Search job progress events.
///
/// Every event carries the job handle, a `type` tag and a `complete` flag
/// that is true only on the terminal (`complete` / `error`) event. These are
/// what the fan-out hub logs and what SSE subscribers receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub kind: JobEventKind,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobEventKind {
    /// Non-terminal status change.
    Status { status: JobStatus, message: String },

    /// One slice of issues, in sequence order starting at 1.
    IssuesChunk {
        sequence: u64,
        chunk: Vec<Value>,
        remaining: usize,
    },

    /// Job finished. Carries the full payload.
    Complete {
        status: JobStatus,
        total_issues: u64,
        meta: ResultMeta,
        data: Value,
        cache_hit: bool,
    },

    /// Job failed.
    Error { status: JobStatus, message: String },
}

impl JobEvent {
    pub fn new(job_id: Uuid, kind: JobEventKind) -> Self {
        let complete = kind.is_terminal();
        Self {
            job_id,
            kind,
            complete,
        }
    }

    /// SSE event name, identical to the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            JobEventKind::Status { .. } => "status",
            JobEventKind::IssuesChunk { .. } => "issuesChunk",
            JobEventKind::Complete { .. } => "complete",
            JobEventKind::Error { .. } => "error",
        }
    }
}

impl JobEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEventKind::Complete { .. } | JobEventKind::Error { .. })
    }
}

impl HubEvent for JobEvent {
    fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}
