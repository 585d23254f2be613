//! Bounded FIFO execution queue.
//!
//! At most `max_concurrent` units of work run at once. Submissions beyond
//! that wait in a FIFO and are started, in order, as running work finishes.
//! Each running slot is a Tokio task that keeps draining the pending list
//! until it finds it empty, at which point the slot is released.

use crate::dispatch::worker::WorkId;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of requests allowed in flight.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

struct QueuedWork {
    id: WorkId,
    future: BoxFuture<'static, ()>,
}

struct QueueState {
    pending: VecDeque<QueuedWork>,
    running: usize,
}

struct QueueInner {
    max_concurrent: usize,
    state: Mutex<QueueState>,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand the slot to the next pending item, or give it back.
    fn next_or_release(&self) -> Option<QueuedWork> {
        let mut state = self.lock();
        match state.pending.pop_front() {
            Some(work) => Some(work),
            None => {
                state.running = state.running.saturating_sub(1);
                None
            }
        }
    }
}

/// Shared execution queue. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct ExecutionQueue {
    inner: Arc<QueueInner>,
}

impl Default for ExecutionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl fmt::Debug for ExecutionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ExecutionQueue")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("running", &state.running)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl ExecutionQueue {
    /// Create a queue running at most `max_concurrent` items (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: 0,
                }),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Number of items holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().running
    }

    /// Number of items waiting for a slot.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Enqueue `future`, starting it immediately if a slot is free.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn submit<F>(&self, id: WorkId, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let work = QueuedWork {
            id,
            future: future.boxed(),
        };

        let mut state = self.inner.lock();
        if state.running < self.inner.max_concurrent {
            state.running += 1;
            drop(state);
            tracing::trace!(id = %id, "starting request slot");
            spawn_slot(self.inner.clone(), work);
        } else {
            state.pending.push_back(work);
            tracing::trace!(id = %id, pending = state.pending.len(), "request queued");
        }
    }

    /// Drop a pending item. Returns false if it is not waiting (already
    /// started, finished or never submitted).
    pub fn remove(&self, id: WorkId) -> bool {
        let mut state = self.inner.lock();
        match state.pending.iter().position(|w| w.id == id) {
            Some(index) => {
                state.pending.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Keeps a slot draining if the work it was running panicked.
struct SlotGuard {
    inner: Arc<QueueInner>,
    armed: bool,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(work) = self.inner.next_or_release() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let inner = self.inner.clone();
                    handle.spawn(drain(inner, work));
                }
                Err(_) => {
                    tracing::warn!(id = %work.id, "runtime gone; dropping queued request");
                    let mut state = self.inner.lock();
                    state.running = state.running.saturating_sub(1);
                }
            }
        }
    }
}

fn spawn_slot(inner: Arc<QueueInner>, first: QueuedWork) {
    tokio::spawn(drain(inner, first));
}

async fn drain(inner: Arc<QueueInner>, first: QueuedWork) {
    let mut guard = SlotGuard {
        inner: inner.clone(),
        armed: true,
    };
    let mut next = Some(first);
    while let Some(work) = next {
        work.future.await;
        next = inner.next_or_release();
    }
    guard.armed = false;
}
