//! SSE streaming endpoint.
//!
//! GET /api/jira/search/jobs/:id/stream
//!
//! Replays the job's full event history, then forwards live events until the
//! terminal one. An unknown handle gets a single `error` event and the stream
//! closes.

use std::convert::Infallible;

use axum::{
    extract::{Extension, Path},
    response::sse::{Event, Sse},
};
use futures::stream::{BoxStream, StreamExt};

use super::search::parse_job_id;
use crate::kernel::sse::{into_sse, job_event_stream, unknown_job_stream};
use crate::server::app::AxumAppState;

pub async fn stream_handler(
    Extension(state): Extension<AxumAppState>,
    Path(raw_id): Path<String>,
) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let subscription = parse_job_id(&raw_id).and_then(|id| state.orchestrator.subscribe(id));

    let events = match subscription {
        Some(subscription) => {
            tracing::debug!(job_id = %raw_id, "stream subscriber attached");
            job_event_stream(subscription).boxed()
        }
        None => {
            tracing::debug!(job_id = %raw_id, "stream requested for unknown job");
            unknown_job_stream(raw_id).boxed()
        }
    };

    into_sse(events)
}
