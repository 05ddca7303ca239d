use std::fmt;

use thiserror::Error;

use crate::grant::GrantId;

/// Errors returned synchronously from `CaptureController::start`.
///
/// A start error always terminates the attempted session; the controller is
/// back in `Idle` by the time the caller sees it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("a capture session is already active")]
    AlreadyActive,

    #[error("capture grant is invalid or already consumed")]
    InvalidGrant,

    #[error("capture permission denied")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unsupported capture format: {0}")]
    UnsupportedFormat(String),

    #[error("buffer sizing failed: {0}")]
    BufferSizingFailed(String),
}

/// Stop never fails. The type is uninhabited and exists so that `stop`
/// keeps a `Result` signature alongside `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopError {}

impl fmt::Display for StopError {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl std::error::Error for StopError {}

/// Errors from opening a capture device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenError {
    #[error("capture grant is no longer valid")]
    InvalidGrant,

    #[error("capture permission denied")]
    PermissionDenied,

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("buffer sizing failed: {0}")]
    BufferSizingFailed(String),
}

impl From<OpenError> for StartError {
    fn from(err: OpenError) -> Self {
        match err {
            OpenError::InvalidGrant => StartError::InvalidGrant,
            OpenError::PermissionDenied => StartError::PermissionDenied,
            OpenError::DeviceUnavailable(msg) => StartError::DeviceUnavailable(msg),
            OpenError::UnsupportedFormat(msg) => StartError::UnsupportedFormat(msg),
            OpenError::BufferSizingFailed(msg) => StartError::BufferSizingFailed(msg),
        }
    }
}

/// Errors from turning a raw grant into a held one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("user declined the capture request")]
    Denied,

    #[error("grant {0} was already consumed")]
    Stale(GrantId),

    #[error("grant {0} was revoked by the host")]
    Revoked(GrantId),
}

impl From<GrantError> for StartError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::Denied => StartError::PermissionDenied,
            GrantError::Stale(_) | GrantError::Revoked(_) => StartError::InvalidGrant,
        }
    }
}

impl From<GrantError> for OpenError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::Denied => OpenError::PermissionDenied,
            GrantError::Stale(_) | GrantError::Revoked(_) => OpenError::InvalidGrant,
        }
    }
}

/// Errors from a single device read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Recoverable empty or short read. The capture loop retries a bounded
    /// number of times before promoting it to `Fatal`.
    #[error("transient read failure")]
    Transient,

    /// The device was invalidated; the session must end.
    #[error("fatal read failure: {0}")]
    Fatal(String),
}

/// Errors reported by the downstream sink for one frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardError {
    #[error("sink rejected frame: {0}")]
    SinkRejected(String),

    #[error("sink unavailable")]
    SinkUnavailable,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from building a `CaptureController`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn controller thread: {0}")]
    SpawnFailed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Errors from translating an external command into a controller call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("unknown control action: {0}")]
    UnknownAction(String),

    #[error("start requested without a capture grant")]
    MissingGrant,
}
