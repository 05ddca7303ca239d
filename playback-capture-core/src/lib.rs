//! # playback-capture-core
//!
//! Platform-agnostic core of internal playback capture.
//!
//! Turns a user-granted capture authorization into a running session that
//! reads PCM frames from the host's playback mix and forwards them, in
//! order, to a downstream sink. Platform backends (Windows WASAPI loopback)
//! implement the `CaptureBackend` trait and plug into the generic
//! `CaptureController`.
//!
//! ## Architecture
//!
//! ```text
//! playback-capture-core (this crate)
//! ├── grant.rs      ← CaptureGrant, GrantHolder, HeldGrant (consume-once tokens)
//! ├── control.rs    ← ControlCommand (REQUEST_START / REQUEST_STOP)
//! ├── traits/       ← CaptureBackend, CaptureDevice, FrameSink, PresenceHooks, SessionDelegate
//! ├── models/       ← errors, SessionState, CaptureConfiguration, CaptureFormat, AudioFrame
//! ├── pipeline/     ← DevicePipeline (device + single buffer), FrameForwarder, StopSignal
//! ├── session/      ← CaptureController (state machine on its own thread), capture loop
//! ├── sinks/        ← ChannelSink, WavTapSink
//! └── processing/   ← WAV header generation
//! ```

pub mod control;
pub mod grant;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod session;
pub mod sinks;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use control::{ControlCommand, ACTION_START, ACTION_STOP};
pub use grant::{CaptureGrant, GrantAuthority, GrantHolder, GrantId, GrantStatus, HeldGrant};
pub use models::config::CaptureConfiguration;
pub use models::error::{
    ConfigError, ControlError, ForwardError, GrantError, OpenError, ReadError, SetupError, StartError, StopError,
    StorageError,
};
pub use models::format::{CaptureFormat, SampleEncoding};
pub use models::frame::AudioFrame;
pub use models::state::{FailureCause, SessionDiagnostics, SessionState};
pub use pipeline::stop_signal::StopSignal;
pub use session::controller::{CaptureController, ControllerBuilder};
pub use sinks::channel::{ChannelSink, OwnedFrame};
pub use sinks::wav_tap::{TapSummary, WavTapSink};
pub use traits::capture_backend::{CaptureBackend, CaptureDevice};
pub use traits::frame_sink::FrameSink;
pub use traits::presence::{LogPresence, PresenceHooks, StatusNotice};
pub use traits::session_delegate::SessionDelegate;
