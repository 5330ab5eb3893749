use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared pause-request flag.
///
/// Clones may be handed to UI or operator threads; the only thing they can do
/// is raise the flag. The engine clears it at its own checkpoints.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle {
    requested: Arc<AtomicBool>,
}

impl PauseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Reads and clears the flag in one step.
    pub fn take_request(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

/// Position of the engine within a session. Only the engine mutates it.
#[derive(Debug, Clone, Default)]
pub struct EngineCursor {
    pub trial_index: usize,
    pub block: u32,
    pub score: i64,
    pub in_pause: bool,
    pause: PauseHandle,
}

impl EngineCursor {
    pub fn new(pause: PauseHandle) -> Self {
        Self {
            pause,
            ..Self::default()
        }
    }

    pub fn pause_requested(&self) -> bool {
        self.pause.is_requested()
    }

    pub fn pause_handle(&self) -> &PauseHandle {
        &self.pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_visible_through_clones_and_cleared_once() {
        let cursor = EngineCursor::new(PauseHandle::new());
        let remote = cursor.pause_handle().clone();

        remote.request();
        assert!(cursor.pause_requested());
        assert!(cursor.pause_handle().take_request());
        assert!(!cursor.pause_handle().take_request());
        assert!(!remote.is_requested());
    }
}
