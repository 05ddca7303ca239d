use std::time::Instant;

use crate::grant::HeldGrant;
use crate::models::config::CaptureConfiguration;
use crate::models::error::{OpenError, ReadError};
use crate::models::format::CaptureFormat;
use crate::models::frame::AudioFrame;
use crate::pipeline::stop_signal::StopSignal;
use crate::traits::capture_backend::{CaptureBackend, CaptureDevice};

/// An open capture device together with its single reusable read buffer.
///
/// Frames returned by [`DevicePipeline::read_next`] borrow the buffer, so the
/// next read cannot start until the previous frame has been forwarded.
pub struct DevicePipeline<D: CaptureDevice> {
    device: D,
    buffer: Vec<u8>,
    format: CaptureFormat,
    opened_at: Instant,
    last_timestamp: Option<u64>,
    next_sequence: u64,
}

impl<D: CaptureDevice> DevicePipeline<D> {
    /// Validate the requested format, size the buffer and open the device.
    ///
    /// The grant is spent either way: its issuance was consumed when it was
    /// acquired.
    pub fn open<B>(
        backend: &mut B,
        grant: &HeldGrant,
        config: &CaptureConfiguration,
        stop: StopSignal,
    ) -> Result<Self, OpenError>
    where
        B: CaptureBackend<Device = D>,
    {
        let format = config.format;
        format.validate().map_err(OpenError::UnsupportedFormat)?;

        let buffer_size = format.min_buffer_size(config.buffer_millis).ok_or_else(|| {
            OpenError::BufferSizingFailed(format!(
                "{} ms at {} Hz x {} ch yields no usable buffer",
                config.buffer_millis, format.sample_rate, format.channels
            ))
        })?;

        grant.validate()?;

        let device = backend.open(grant, config, buffer_size, stop)?;
        log::info!(
            "Opened {} capture device: {} Hz, {} ch, {:?}, {} byte buffer",
            backend.name(),
            format.sample_rate,
            format.channels,
            format.encoding,
            buffer_size
        );

        Ok(Self {
            device,
            buffer: vec![0; buffer_size],
            format,
            opened_at: Instant::now(),
            last_timestamp: None,
            next_sequence: 0,
        })
    }

    /// Read the next frame from the device.
    pub fn read_next(&mut self) -> Result<AudioFrame<'_>, ReadError> {
        let read = self.device.read(&mut self.buffer)?;
        if read == 0 {
            return Err(ReadError::Transient);
        }
        let len = read.min(self.buffer.len());

        let elapsed = self.opened_at.elapsed().as_nanos() as u64;
        let timestamp = match self.last_timestamp {
            Some(last) if elapsed <= last => last + 1,
            _ => elapsed,
        };
        self.last_timestamp = Some(timestamp);

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Ok(AudioFrame {
            bytes: &self.buffer[..len],
            timestamp_nanos: timestamp,
            sequence,
        })
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.next_sequence
    }

    pub fn close(self) {
        self.device.close();
        log::info!("Closed capture device after {} frames", self.next_sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{CaptureGrant, GrantHolder};
    use crate::models::format::CaptureFormat;
    use crate::testing::{CountingAuthority, ScriptedBackend, Step};

    fn held_grant() -> (HeldGrant, std::sync::Arc<CountingAuthority>) {
        let authority = CountingAuthority::new();
        let holder = GrantHolder::new(authority.clone());
        (holder.acquire(CaptureGrant::granted()).unwrap(), authority)
    }

    #[test]
    fn unsupported_format_never_reaches_backend() {
        let mut backend = ScriptedBackend::new(vec![]);
        let (grant, _) = held_grant();
        let config = CaptureConfiguration {
            format: CaptureFormat {
                channels: 6,
                ..Default::default()
            },
            ..Default::default()
        };

        let err = DevicePipeline::open(&mut backend, &grant, &config, StopSignal::new()).err();
        assert!(matches!(err, Some(OpenError::UnsupportedFormat(_))));
        assert_eq!(backend.counters().opens(), 0);
        grant.release();
    }

    #[test]
    fn zero_length_buffer_fails_sizing() {
        let mut backend = ScriptedBackend::new(vec![]);
        let (grant, _) = held_grant();
        let config = CaptureConfiguration {
            buffer_millis: 0,
            ..Default::default()
        };

        let err = DevicePipeline::open(&mut backend, &grant, &config, StopSignal::new()).err();
        assert!(matches!(err, Some(OpenError::BufferSizingFailed(_))));
        assert_eq!(backend.counters().opens(), 0);
        grant.release();
    }

    #[test]
    fn revoked_grant_fails_open() {
        let mut backend = ScriptedBackend::new(vec![]);
        let (grant, authority) = held_grant();
        authority.kill(grant.id());

        let err = DevicePipeline::open(&mut backend, &grant, &CaptureConfiguration::default(), StopSignal::new()).err();
        assert_eq!(err, Some(OpenError::InvalidGrant));
        grant.release();
    }

    #[test]
    fn frames_are_sequenced_with_increasing_timestamps() {
        let mut backend = ScriptedBackend::new(vec![
            Step::Frame(vec![1; 8]),
            Step::Frame(vec![2; 8]),
            Step::Frame(vec![3; 8]),
        ]);
        let (grant, _) = held_grant();
        let mut pipeline =
            DevicePipeline::open(&mut backend, &grant, &CaptureConfiguration::default(), StopSignal::new()).unwrap();

        let mut last = None;
        for expected in 1..=3u8 {
            let frame = pipeline.read_next().unwrap();
            assert_eq!(frame.bytes, &[expected; 8][..]);
            assert_eq!(frame.sequence, u64::from(expected - 1));
            if let Some(prev) = last {
                assert!(frame.timestamp_nanos > prev);
            }
            last = Some(frame.timestamp_nanos);
        }

        assert_eq!(pipeline.frames_read(), 3);
        pipeline.close();
        assert_eq!(backend.counters().closes(), 1);
        grant.release();
    }

    #[test]
    fn empty_read_is_transient() {
        let mut backend = ScriptedBackend::new(vec![Step::Frame(Vec::new()), Step::Fatal]);
        let (grant, _) = held_grant();
        let mut pipeline =
            DevicePipeline::open(&mut backend, &grant, &CaptureConfiguration::default(), StopSignal::new()).unwrap();

        assert_eq!(pipeline.read_next().err(), Some(ReadError::Transient));
        assert!(matches!(pipeline.read_next().err(), Some(ReadError::Fatal(_))));
        pipeline.close();
        grant.release();
    }
}
