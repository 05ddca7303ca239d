use crossbeam_channel::Sender;

use crate::grant::CaptureGrant;
use crate::models::error::StartError;
use crate::models::state::{FailureCause, SessionDiagnostics, SessionState};

/// Messages processed one at a time by the controller thread.
pub(crate) enum Command {
    Start {
        grant: CaptureGrant,
        reply: Sender<Result<(), StartError>>,
    },
    Stop {
        reply: Sender<()>,
    },
    /// Sent by a capture loop that ended on its own.
    LoopEnded {
        generation: u64,
        cause: FailureCause,
    },
    Shutdown,
}

/// Snapshot readable from any thread. Only the controller thread writes
/// `state`; capture loops only bump diagnostics.
pub(crate) struct SharedStatus {
    pub state: SessionState,
    pub diagnostics: SessionDiagnostics,
    /// Set by `start` before it posts to the mailbox, cleared by the
    /// controller thread once that start has resolved. At most one start is
    /// ever in the mailbox.
    pub start_pending: bool,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            diagnostics: SessionDiagnostics::default(),
            start_pending: false,
        }
    }
}
