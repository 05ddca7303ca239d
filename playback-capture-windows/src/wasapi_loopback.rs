//! WASAPI loopback capture backend for the system playback mix.
//!
//! Captures the audio going to a render endpoint using
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`. No special permissions needed on Windows.
//!
//! ## Notes
//! - Captures the mix of one render endpoint, not of every device
//! - DRM-protected audio is silenced in loopback
//! - The shared-mode engine converts to the requested format
//!   (`AUTOCONVERTPCM`), so the session format need not match the mix format

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::AvSetMmThreadCharacteristicsW;

use playback_capture_core::grant::HeldGrant;
use playback_capture_core::models::config::CaptureConfiguration;
use playback_capture_core::models::error::{OpenError, ReadError};
use playback_capture_core::models::format::CaptureFormat;
use playback_capture_core::pipeline::stop_signal::StopSignal;
use playback_capture_core::traits::capture_backend::{CaptureBackend, CaptureDevice};

use crate::com::ComApartment;
use crate::hresult;

const WAVE_FORMAT_PCM_TAG: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT_TAG: u16 = 3;

/// How long a read sleeps between polls when no packet is ready.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Loopback backend bound to the default render endpoint or a specific one.
#[derive(Debug, Clone, Default)]
pub struct WasapiLoopbackBackend {
    endpoint_id: Option<String>,
}

impl WasapiLoopbackBackend {
    pub fn default_endpoint() -> Self {
        Self::default()
    }

    /// Capture the endpoint with this MMDevice id (see `RenderEndpointEnumerator`).
    pub fn for_endpoint(endpoint_id: impl Into<String>) -> Self {
        Self {
            endpoint_id: Some(endpoint_id.into()),
        }
    }
}

impl CaptureBackend for WasapiLoopbackBackend {
    type Device = LoopbackDevice;

    fn name(&self) -> &str {
        "wasapi-loopback"
    }

    fn open(
        &mut self,
        grant: &HeldGrant,
        config: &CaptureConfiguration,
        buffer_size: usize,
        stop: StopSignal,
    ) -> Result<LoopbackDevice, OpenError> {
        let apartment = ComApartment::enter()
            .map_err(|e| OpenError::DeviceUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        let (audio_client, capture_client) = unsafe { self.activate(&config.format, config.buffer_millis)? };

        unsafe { audio_client.Start() }.map_err(|e| open_failed("IAudioClient::Start", e))?;
        log::info!(
            "Loopback stream started for grant {} ({})",
            grant.id(),
            self.endpoint_id.as_deref().unwrap_or("default endpoint")
        );

        Ok(LoopbackDevice {
            audio_client,
            capture_client,
            block_align: config.format.bytes_per_frame(),
            pending: VecDeque::with_capacity(buffer_size),
            stop,
            mmcss_registered: false,
            _apartment: apartment,
        })
    }
}

impl WasapiLoopbackBackend {
    /// Sequence:
    /// 1. Resolve the render endpoint (default or by id)
    /// 2. Activate IAudioClient
    /// 3. Initialize shared mode with LOOPBACK and PCM auto-conversion
    /// 4. Get IAudioCaptureClient
    unsafe fn activate(
        &self,
        format: &CaptureFormat,
        buffer_millis: u32,
    ) -> Result<(IAudioClient, IAudioCaptureClient), OpenError> {
        let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| open_failed("CoCreateInstance", e))?;

        // Loopback reads from a RENDER endpoint, not a capture one.
        let device = match &self.endpoint_id {
            Some(id) => {
                let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                enumerator.GetDevice(PCWSTR(wide.as_ptr()))
            }
            None => enumerator.GetDefaultAudioEndpoint(eRender, eConsole),
        }
        .map_err(|e| open_failed("endpoint lookup", e))?;

        let audio_client: IAudioClient = device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| open_failed("IMMDevice::Activate", e))?;

        let wave_format = wave_format(format);
        let buffer_duration = i64::from(buffer_millis) * 10_000; // 100ns units

        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK
                    | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                    | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY
                    | AUDCLNT_STREAMFLAGS_NOPERSIST,
                buffer_duration,
                0,
                &wave_format,
                None,
            )
            .map_err(|e| open_failed("IAudioClient::Initialize (loopback)", e))?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| open_failed("IAudioClient::GetService", e))?;

        Ok((audio_client, capture_client))
    }
}

fn wave_format(format: &CaptureFormat) -> WAVEFORMATEX {
    let block_align = format.bytes_per_frame() as u16;
    WAVEFORMATEX {
        wFormatTag: if format.encoding.is_float() {
            WAVE_FORMAT_IEEE_FLOAT_TAG
        } else {
            WAVE_FORMAT_PCM_TAG
        },
        nChannels: format.channels,
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.sample_rate * u32::from(block_align),
        nBlockAlign: block_align,
        wBitsPerSample: format.encoding.bits_per_sample(),
        cbSize: 0,
    }
}

fn open_failed(context: &str, e: windows::core::Error) -> OpenError {
    hresult::open_error(e.code().0, context, &e.message())
}

fn read_failed(context: &str, e: windows::core::Error) -> ReadError {
    hresult::read_error(e.code().0, context, &e.message())
}

/// A running loopback stream.
///
/// Opened and closed on the controller thread, read on the capture thread.
pub struct LoopbackDevice {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    block_align: usize,
    /// Packet bytes that did not fit the caller's buffer.
    pending: VecDeque<u8>,
    stop: StopSignal,
    mmcss_registered: bool,
    // Declared last so the COM objects above are released first.
    _apartment: ComApartment,
}

// SAFETY: the stream objects live in the MTA and are only ever used by the
// thread that currently owns the device. The apartment guard checks that it
// is dropped on the thread that entered it.
unsafe impl Send for LoopbackDevice {}

impl LoopbackDevice {
    fn drain_pending(&mut self, buffer: &mut [u8]) -> usize {
        let n = self.pending.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        n
    }

    /// Copy one packet into `buffer`, keeping the overflow for the next read.
    fn take_packet(&mut self, buffer: &mut [u8]) -> Result<usize, ReadError> {
        let mut data: *mut u8 = std::ptr::null_mut();
        let mut num_frames: u32 = 0;
        let mut flags: u32 = 0;
        unsafe {
            self.capture_client
                .GetBuffer(&mut data, &mut num_frames, &mut flags, None, None)
                .map_err(|e| read_failed("GetBuffer", e))?;
        }

        let len = num_frames as usize * self.block_align;
        let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
        let written = len.min(buffer.len());

        if silent || data.is_null() {
            buffer[..written].fill(0);
            self.pending.extend(std::iter::repeat(0).take(len - written));
        } else {
            let packet = unsafe { std::slice::from_raw_parts(data, len) };
            buffer[..written].copy_from_slice(&packet[..written]);
            self.pending.extend(&packet[written..]);
        }

        unsafe { self.capture_client.ReleaseBuffer(num_frames) }.map_err(|e| read_failed("ReleaseBuffer", e))?;
        Ok(written)
    }

    fn register_mmcss(&mut self) {
        if self.mmcss_registered {
            return;
        }
        self.mmcss_registered = true;
        // Registration lapses when the capture thread exits.
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        if let Err(e) = unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
            log::debug!("MMCSS registration failed: {}", e);
        }
    }
}

impl CaptureDevice for LoopbackDevice {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ReadError> {
        self.register_mmcss();

        let carried = self.drain_pending(buffer);
        if carried > 0 {
            return Ok(carried);
        }

        loop {
            if self.stop.is_raised() {
                return Ok(0);
            }
            let packet_length =
                unsafe { self.capture_client.GetNextPacketSize() }.map_err(|e| read_failed("GetNextPacketSize", e))?;
            if packet_length == 0 {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            let written = self.take_packet(buffer)?;
            if written > 0 {
                return Ok(written);
            }
        }
    }

    fn close(self) {
        if let Err(e) = unsafe { self.audio_client.Stop() } {
            log::warn!("IAudioClient::Stop failed: {}", e);
        }
        log::info!("Loopback stream closed");
    }
}
