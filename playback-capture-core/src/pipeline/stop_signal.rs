use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative end-of-session flag shared by the controller, the capture
/// loop and the device. Raised once, never lowered.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
