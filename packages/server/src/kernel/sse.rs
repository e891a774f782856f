//! Server-Sent Events transport for job subscriptions.
//!
//! Turns a hub [`Subscription`] into an axum SSE stream. The SSE event name is
//! the job event's `type` tag and the data is the event as JSON. The stream
//! ends right after the terminal event.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;

use super::jobs::JobEvent;
use super::stream_hub::Subscription;

/// Encode one job event as an SSE frame.
pub fn to_sse_event(event: &JobEvent) -> Option<Event> {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(job_id = %event.job_id, error = %e, "failed to encode job event");
            None
        }
    }
}

/// Replay-then-live stream for a known job.
pub fn job_event_stream(
    subscription: Subscription<JobEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    subscription
        .into_stream()
        .filter_map(|event| async move { to_sse_event(&event).map(Ok) })
}

/// A single synthetic `error` event for a handle that matches no job.
pub fn unknown_job_stream(raw_id: String) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    let payload = json!({
        "jobId": raw_id,
        "type": "error",
        "status": "error",
        "message": "Job not found",
        "complete": true,
    });

    stream::iter(
        Event::default()
            .event("error")
            .json_data(payload)
            .ok()
            .map(Ok),
    )
}

/// Wrap an event stream in an SSE response with keep-alive comments.
pub fn into_sse<S>(events: S) -> Sse<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(events).keep_alive(KeepAlive::default())
}
