use std::sync::atomic::{AtomicU8, Ordering};

/// The lifecycle state of a queued request.
///
/// `Created → Queued → Running → {Succeeded, Failed, Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WorkState {
    /// Built but not yet handed to a queue.
    #[default]
    Created = 0,

    /// Waiting for a free concurrency slot.
    Queued = 1,

    /// Holding a slot; cache lookup and network exchange in progress.
    Running = 2,

    /// `success` was delivered.
    Succeeded = 3,

    /// `failure` was delivered.
    Failed = 4,

    /// Cancelled; no further callbacks.
    Cancelled = 5,
}

impl WorkState {
    /// Whether the state is final.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkState::Succeeded | WorkState::Failed | WorkState::Cancelled
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkState::Queued,
            2 => WorkState::Running,
            3 => WorkState::Succeeded,
            4 => WorkState::Failed,
            5 => WorkState::Cancelled,
            _ => WorkState::Created,
        }
    }
}

/// Shared, lock-free holder for a [`WorkState`].
///
/// Terminal states are sticky: once reached, later transitions are refused.
#[derive(Debug, Default)]
pub struct AtomicWorkState(AtomicU8);

impl AtomicWorkState {
    pub fn new(state: WorkState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> WorkState {
        WorkState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless already terminal. Returns whether the move happened.
    pub fn transition(&self, next: WorkState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if WorkState::from_u8(current).is_terminal() {
                    None
                } else {
                    Some(next as u8)
                }
            })
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.load() == WorkState::Cancelled
    }
}
