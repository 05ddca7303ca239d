use crate::models::error::ForwardError;
use crate::models::state::SessionState;

/// Event delegate for capture session notifications.
///
/// State changes are reported from the controller thread, forward errors from
/// the capture thread. Implementations should marshal to a UI thread if needed.
pub trait SessionDelegate: Send + Sync {
    /// Called after every published state transition.
    fn on_state_changed(&self, state: &SessionState, generation: u64);

    /// Called when the sink fails to take a frame.
    fn on_forward_error(&self, _error: &ForwardError) {}
}
