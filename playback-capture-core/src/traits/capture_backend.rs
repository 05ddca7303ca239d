use crate::grant::HeldGrant;
use crate::models::config::CaptureConfiguration;
use crate::models::error::{OpenError, ReadError};
use crate::pipeline::stop_signal::StopSignal;

/// Interface for platform-specific playback capture sources.
///
/// Implemented by:
/// - `WasapiLoopbackBackend` (Windows)
/// - the scripted backend used in tests
pub trait CaptureBackend: Send + 'static {
    type Device: CaptureDevice;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Open a capture device authorized by `grant`.
    ///
    /// `config.format` has already been validated and `buffer_size` is the
    /// size of the buffer every `read` will be handed. `stop` is raised when
    /// the session is tearing down; a device that waits for data should give
    /// up once it is raised.
    fn open(
        &mut self,
        grant: &HeldGrant,
        config: &CaptureConfiguration,
        buffer_size: usize,
        stop: StopSignal,
    ) -> Result<Self::Device, OpenError>;
}

/// A live capture device.
///
/// Lives on the capture thread while a session records and comes back to the
/// controller thread to be closed.
pub trait CaptureDevice: Send + 'static {
    /// Block until audio is available and copy it into `buffer`.
    ///
    /// Returns the number of bytes written. `Ok(0)` means nothing was
    /// captured and is treated as a transient failure.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ReadError>;

    /// Release the device. Consumes it, so it cannot be closed twice.
    fn close(self);
}
