//! External command surface: the two actions a host shell can send.

use crate::grant::CaptureGrant;
use crate::models::error::{ControlError, StartError};
use crate::session::controller::CaptureController;

pub const ACTION_START: &str = "REQUEST_START";
pub const ACTION_STOP: &str = "REQUEST_STOP";

#[derive(Debug)]
pub enum ControlCommand {
    RequestStart(CaptureGrant),
    RequestStop,
}

impl ControlCommand {
    /// Build a command from an action name and the grant that came with it.
    ///
    /// A grant attached to a stop request is dropped unused.
    pub fn parse(action: &str, grant: Option<CaptureGrant>) -> Result<Self, ControlError> {
        match action {
            ACTION_START => grant.map(Self::RequestStart).ok_or(ControlError::MissingGrant),
            ACTION_STOP => Ok(Self::RequestStop),
            other => Err(ControlError::UnknownAction(other.to_string())),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::RequestStart(_) => ACTION_START,
            Self::RequestStop => ACTION_STOP,
        }
    }
}

impl CaptureController {
    /// Apply an external command.
    pub fn handle(&self, command: ControlCommand) -> Result<(), StartError> {
        log::debug!("Handling {}", command.action());
        match command {
            ControlCommand::RequestStart(grant) => self.start(grant),
            ControlCommand::RequestStop => {
                let Ok(()) = self.stop();
                Ok(())
            }
        }
    }
}
