use super::error::{ForwardError, ReadError, StartError};

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Start(StartError),
    Read(ReadError),
    Sink(ForwardError),
}

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → acquiring → recording → stopping → idle
///           ↓            ↓
///         failed  →    idle
/// ```
///
/// `Failed` is published on the way back to `Idle` and never persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Recording,
    Stopping,
    Failed(FailureCause),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Whether the device or grant may be held in this state.
    pub fn holds_resources(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Recording | Self::Stopping)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Failed(_) => "failed",
        }
    }
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub generation: u64,
    pub sessions_started: u64,
    pub frames_forwarded: u64,
    pub bytes_forwarded: u64,
    pub forward_failures: u64,
    pub transient_reads: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_states_hold_resources() {
        assert!(!SessionState::Idle.holds_resources());
        assert!(SessionState::Acquiring.holds_resources());
        assert!(SessionState::Recording.holds_resources());
        assert!(SessionState::Stopping.holds_resources());
        assert!(!SessionState::Failed(FailureCause::Read(ReadError::Transient)).holds_resources());
    }

    #[test]
    fn names() {
        assert_eq!(SessionState::Idle.name(), "idle");
        assert_eq!(
            SessionState::Failed(FailureCause::Sink(ForwardError::SinkUnavailable)).name(),
            "failed"
        );
    }
}
