use serde::{Deserialize, Serialize};

/// Sample rates the capture device accepts, in Hz.
pub const SUPPORTED_SAMPLE_RATES: [u32; 7] = [8000, 11025, 16000, 22050, 32000, 44100, 48000];

/// On-the-wire sample encoding of captured PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    Pcm8,
    Pcm16,
    Float32,
}

impl SampleEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Pcm8 => 1,
            Self::Pcm16 => 2,
            Self::Float32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32)
    }
}

/// Requested capture format.
///
/// Defaults to 44.1 kHz interleaved stereo, signed 16-bit little-endian,
/// which is what the downstream media pipeline expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl CaptureFormat {
    pub fn validate(&self) -> Result<(), String> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(format!("unsupported sample rate: {}", self.sample_rate));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }

    /// Bytes in one interleaved frame (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.encoding.bytes_per_sample()
    }

    /// Smallest read buffer that holds `buffer_millis` of audio, rounded down
    /// to whole frames. `None` when the result is zero or overflows.
    pub fn min_buffer_size(&self, buffer_millis: u32) -> Option<usize> {
        let frames = u64::from(self.sample_rate).checked_mul(u64::from(buffer_millis))? / 1000;
        let bytes = frames.checked_mul(self.bytes_per_frame() as u64)?;
        match usize::try_from(bytes) {
            Ok(0) | Err(_) => None,
            Ok(size) => Some(size),
        }
    }

    /// Playback duration of `byte_len` bytes of audio in this format.
    pub fn duration_nanos(&self, byte_len: usize) -> u64 {
        let bytes_per_frame = self.bytes_per_frame() as u64;
        if bytes_per_frame == 0 || self.sample_rate == 0 {
            return 0;
        }
        let frames = byte_len as u64 / bytes_per_frame;
        frames.saturating_mul(1_000_000_000) / u64::from(self.sample_rate)
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            encoding: SampleEncoding::Pcm16,
        }
    }
}
