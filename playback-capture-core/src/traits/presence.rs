use serde::{Deserialize, Serialize};

/// Content of the persistent "capturing" status shown while recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusNotice {
    pub title: String,
    pub text: String,
    /// Label of the action that sends a stop request.
    pub stop_label: String,
    /// Keep the status pinned until the session ends.
    pub ongoing: bool,
}

impl Default for StatusNotice {
    fn default() -> Self {
        Self {
            title: "Capturing Audio".into(),
            text: "Internal audio capture is active.".into(),
            stop_label: "Stop".into(),
            ongoing: true,
        }
    }
}

/// Foreground presence collaborator.
///
/// `on_session_started` runs when a session enters `Recording`;
/// `on_session_ended` runs when that session has released its resources.
pub trait PresenceHooks: Send + Sync {
    fn on_session_started(&self, notice: &StatusNotice);
    fn on_session_ended(&self);
}

/// Presence that only writes to the log. Useful for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresence;

impl PresenceHooks for LogPresence {
    fn on_session_started(&self, notice: &StatusNotice) {
        log::info!("{}: {}", notice.title, notice.text);
    }

    fn on_session_ended(&self) {
        log::info!("Capture status cleared");
    }
}
