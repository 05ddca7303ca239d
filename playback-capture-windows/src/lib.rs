//! # playback-capture-windows
//!
//! Windows WASAPI loopback backend for playback-capture.
//!
//! Provides:
//! - `WasapiLoopbackBackend`: capture of a render endpoint's mix via WASAPI loopback
//! - `RenderEndpointEnumerator`: render endpoint listing via the MMDevice API
//! - `LoopbackGrantAuthority`: grant issuance (loopback needs no user consent on Windows)
//!
//! ## Platform Requirements
//! - Windows 10 or later
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use playback_capture_core::{CaptureController, CaptureFormat, WavTapSink};
//! use playback_capture_windows::{LoopbackGrantAuthority, WasapiLoopbackBackend};
//!
//! let authority = Arc::new(LoopbackGrantAuthority::new());
//! let sink = Arc::new(WavTapSink::create("tap.wav", CaptureFormat::default())?);
//! let controller = CaptureController::builder(WasapiLoopbackBackend::default_endpoint(), authority.clone(), sink)
//!     .spawn()?;
//! controller.start(authority.issue())?;
//! ```

pub mod endpoint;
pub mod hresult;
pub mod permissions;

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

pub use endpoint::{EndpointTransport, LoopbackEndpoint};
pub use permissions::LoopbackGrantAuthority;

#[cfg(target_os = "windows")]
pub use device_enumerator::{EnumerateError, RenderEndpointEnumerator};
#[cfg(target_os = "windows")]
pub use wasapi_loopback::{LoopbackDevice, WasapiLoopbackBackend};
