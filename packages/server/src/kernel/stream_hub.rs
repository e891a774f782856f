//! Replaying fan-out hub for real-time streaming.
//!
//! One hub per job. Every published event is appended to an append-only log
//! and forwarded to each registered subscriber. A new subscriber first gets
//! the whole log in order, then live events, so late joiners never see a
//! partial history.
//!
//! # Usage
//!
//! Producer (the job's single writer):
//!   hub.publish(event);
//!
//! Consumers (SSE endpoints):
//!   let mut sub = hub.subscribe();
//!   while let Some(event) = sub.next().await { ... }
//!
//! Once a terminal event is published the hub is closed: later subscribers
//! get the replay and an immediately closed channel. Live subscribers stay
//! registered until they have drained up to the terminal event or dropped
//! their [`Subscription`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::mpsc;

/// Events carried by a [`StreamHub`].
pub trait HubEvent: Send + Sync + 'static {
    /// Terminal events close the hub; nothing is accepted after one.
    fn is_terminal(&self) -> bool;
}

type Sink<E> = mpsc::UnboundedSender<Arc<E>>;

struct HubState<E> {
    log: Vec<Arc<E>>,
    sinks: HashMap<u64, Sink<E>>,
    next_id: u64,
    closed: bool,
}

/// Thread-safe, cloneable. Clones share the same log and subscribers.
pub struct StreamHub<E> {
    state: Arc<Mutex<HubState<E>>>,
}

impl<E> Clone for StreamHub<E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<E: HubEvent> Default for StreamHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: HubEvent> StreamHub<E> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                log: Vec::new(),
                sinks: HashMap::new(),
                next_id: 0,
                closed: false,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState<E>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append to the log and forward to every registered subscriber.
    ///
    /// A subscriber whose receiving side is gone is removed; the others still
    /// get the event. Returns `false` if the hub was already closed, in which
    /// case the event is dropped.
    pub fn publish(&self, event: E) -> bool {
        let event = Arc::new(event);
        let mut state = self.lock();

        if state.closed {
            tracing::warn!("dropping event published after terminal event");
            return false;
        }

        state.log.push(event.clone());

        let mut broken = Vec::new();
        for (id, sink) in state.sinks.iter() {
            if sink.send(event.clone()).is_err() {
                broken.push(*id);
            }
        }
        for id in broken {
            state.sinks.remove(&id);
            tracing::warn!(subscriber = id, "removed disconnected subscriber");
        }

        if event.is_terminal() {
            state.closed = true;
        }
        true
    }

    /// Register a subscriber, replaying the full log to it first.
    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.attach(tx);

        Subscription {
            id,
            rx,
            hub: self.clone(),
            finished: false,
        }
    }

    /// Replay the log into `sink` and register it for live events unless the
    /// hub is closed. Snapshot and registration happen under one lock, so no
    /// event can slip between replay and live delivery.
    pub(crate) fn attach(&self, sink: Sink<E>) -> Option<u64> {
        let mut state = self.lock();

        for event in state.log.iter() {
            if sink.send(event.clone()).is_err() {
                return None;
            }
        }

        if state.closed {
            return None;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.sinks.insert(id, sink);
        Some(id)
    }

    /// Remove a subscriber. Safe to call more than once.
    pub fn unsubscribe(&self, id: u64) -> bool {
        self.lock().sinks.remove(&id).is_some()
    }

    /// Subscribers still attached. Sinks whose receiver went away are pruned
    /// first.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.sinks.retain(|_, sink| !sink.is_closed());
        state.sinks.len()
    }

    /// Copy of the full event log.
    pub fn history(&self) -> Vec<Arc<E>> {
        self.lock().log.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Receiving side of a hub subscription.
///
/// Yields the replayed history, then live events, and ends right after the
/// terminal event. Dropping it unsubscribes.
pub struct Subscription<E: HubEvent> {
    id: Option<u64>,
    rx: mpsc::UnboundedReceiver<Arc<E>>,
    hub: StreamHub<E>,
    finished: bool,
}

impl<E: HubEvent> Subscription<E> {
    pub async fn next(&mut self) -> Option<Arc<E>> {
        if self.finished {
            return None;
        }

        match self.rx.recv().await {
            Some(event) => {
                if event.is_terminal() {
                    self.finish();
                }
                Some(event)
            }
            None => {
                self.finish();
                None
            }
        }
    }

    /// Whether this subscription is registered for live events.
    pub fn is_live(&self) -> bool {
        self.id.is_some()
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(id) = self.id.take() {
            self.hub.unsubscribe(id);
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<E>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|event| (event, sub))
        })
    }
}

impl<E: HubEvent> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.hub.unsubscribe(id);
        }
    }
}
