//! Mapping of WASAPI failure codes onto the core error taxonomy.
//!
//! Kept free of `windows` types so the mapping is testable on any host.

use playback_capture_core::models::error::{OpenError, ReadError};

pub const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;
pub const AUDCLNT_E_DEVICE_INVALIDATED: i32 = 0x8889_0004_u32 as i32;
pub const AUDCLNT_E_UNSUPPORTED_FORMAT: i32 = 0x8889_0008_u32 as i32;
pub const AUDCLNT_E_DEVICE_IN_USE: i32 = 0x8889_000A_u32 as i32;
pub const AUDCLNT_E_SERVICE_NOT_RUNNING: i32 = 0x8889_0010_u32 as i32;

/// Classify a failure from activating or initializing the loopback client.
pub fn open_error(code: i32, context: &str, message: &str) -> OpenError {
    match code {
        E_ACCESSDENIED => OpenError::PermissionDenied,
        AUDCLNT_E_UNSUPPORTED_FORMAT => OpenError::UnsupportedFormat(format!("{}: {}", context, message)),
        _ => OpenError::DeviceUnavailable(format!("{}: {}", context, message)),
    }
}

/// Classify a failure from polling the capture client.
///
/// An invalidated endpoint or a stopped audio service cannot recover; any
/// other code is retried as a transient read.
pub fn read_error(code: i32, context: &str, message: &str) -> ReadError {
    match code {
        AUDCLNT_E_DEVICE_INVALIDATED => ReadError::Fatal(format!("audio endpoint invalidated during {}", context)),
        AUDCLNT_E_SERVICE_NOT_RUNNING => ReadError::Fatal(format!("audio service stopped during {}", context)),
        _ => {
            log::warn!("{} failed, retrying: {}", context, message);
            ReadError::Transient
        }
    }
}
