use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Handle for one requested animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(u64);

impl FrameRequestId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// The host's per-frame callback source (`requestAnimationFrame`-like).
///
/// The host later calls back with the returned id; cancelled ids must not be
/// delivered, and the engine ignores any it no longer expects.
pub trait FrameScheduler {
    fn request_frame(&self) -> FrameRequestId;
    fn cancel_frame(&self, id: FrameRequestId);
}

#[derive(Debug, Default)]
struct ManualState {
    next_id: u64,
    pending: VecDeque<FrameRequestId>,
    requested: u64,
    cancelled: u64,
}

/// Scheduler driven by hand: requests queue up until the caller takes them.
///
/// Clones share state, so a test keeps one clone and hands another to the
/// engine.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualFrameScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest outstanding request, removed from the queue.
    pub fn take_pending(&self) -> Option<FrameRequestId> {
        self.state.borrow_mut().pending.pop_front()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    #[must_use]
    pub fn requested_count(&self) -> u64 {
        self.state.borrow().requested
    }

    #[must_use]
    pub fn cancelled_count(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&self) -> FrameRequestId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.requested += 1;
        let id = FrameRequestId(state.next_id);
        state.pending.push_back(id);
        id
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        let mut state = self.state.borrow_mut();
        if let Some(position) = state.pending.iter().position(|pending| *pending == id) {
            state.pending.remove(position);
            state.cancelled += 1;
        }
    }
}
