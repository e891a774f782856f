//! Bounded-concurrency admission queue.
//!
//! A FIFO of waiting items plus a counter of items currently executing.
//! Both live under one lock so that `release` (decrement, then admit) can
//! never interleave with a concurrent `submit`.
//!
//! The queue does not run anything itself: every operation that frees or
//! fills a slot returns the item it admitted, and the caller starts it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct QueueState<T> {
    waiting: VecDeque<T>,
    executing: usize,
}

#[derive(Debug)]
pub struct AdmissionQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub executing: usize,
    pub waiting: usize,
    pub capacity: usize,
}

impl<T> AdmissionQueue<T> {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                waiting: VecDeque::new(),
                executing: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn admit_locked(&self, state: &mut QueueState<T>) -> Option<T> {
        if state.executing >= self.capacity {
            return None;
        }
        let item = state.waiting.pop_front()?;
        state.executing += 1;
        Some(item)
    }

    /// Enqueue at the tail, then try to admit the head.
    pub fn submit(&self, item: T) -> Option<T> {
        let mut state = self.lock();
        state.waiting.push_back(item);
        self.admit_locked(&mut state)
    }

    /// Admit the head of the queue if a slot is free.
    pub fn try_admit_next(&self) -> Option<T> {
        let mut state = self.lock();
        self.admit_locked(&mut state)
    }

    /// Free one slot and immediately reuse it for the next waiting item.
    /// Call exactly once per admitted item.
    pub fn release(&self) -> Option<T> {
        let mut state = self.lock();
        state.executing = state.executing.saturating_sub(1);
        self.admit_locked(&mut state)
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            executing: state.executing,
            waiting: state.waiting.len(),
            capacity: self.capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
