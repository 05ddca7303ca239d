use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::error::{ForwardError, StorageError};
use crate::models::format::CaptureFormat;
use crate::processing::wav_format;
use crate::traits::frame_sink::FrameSink;

/// Streaming WAV writer fed directly by the capture thread.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, sizes patched on finish]
/// [raw interleaved samples in the capture format...]
/// ```
///
/// A write failure closes the file; the session then sees `SinkUnavailable`
/// and ends. Frames arriving after [`WavTapSink::finish`] are refused the
/// same way.
pub struct WavTapSink {
    file_path: PathBuf,
    format: CaptureFormat,
    started_at: DateTime<Utc>,
    writer: Mutex<Option<TapWriter>>,
}

struct TapWriter {
    file: File,
    data_bytes: u64,
}

/// What a finished tap produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapSummary {
    pub path: PathBuf,
    pub format: CaptureFormat,
    pub started_at: DateTime<Utc>,
    /// Total file size including the header.
    pub bytes_written: u64,
    /// SHA-256 hex digest of the complete file.
    pub checksum: String,
    pub duration_secs: f64,
}

impl WavTapSink {
    /// Create the file (and its directory) and write a placeholder header.
    pub fn create(file_path: impl Into<PathBuf>, format: CaptureFormat) -> Result<Self, StorageError> {
        let file_path = file_path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError(format!("failed to create directory: {}", e)))?;
        }

        let mut file = File::create(&file_path).map_err(|e| StorageError(format!("failed to create file: {}", e)))?;
        file.write_all(&wav_format::generate_wav_header(&format, 0))
            .map_err(|e| StorageError(format!("failed to write header: {}", e)))?;

        log::info!("WAV tap opened at {}", file_path.display());
        Ok(Self {
            file_path,
            format,
            started_at: Utc::now(),
            writer: Mutex::new(Some(TapWriter { file, data_bytes: 0 })),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Audio bytes written so far, excluding the header.
    pub fn data_bytes(&self) -> u64 {
        self.writer.lock().as_ref().map_or(0, |w| w.data_bytes)
    }

    /// Patch the header sizes, close the file and checksum it.
    pub fn finish(&self) -> Result<TapSummary, StorageError> {
        let TapWriter { mut file, data_bytes } = self
            .writer
            .lock()
            .take()
            .ok_or_else(|| StorageError("tap is already finished".into()))?;

        let total = data_bytes + wav_format::WAV_HEADER_SIZE as u64;
        patch_u32(&mut file, 4, wav_format::riff_chunk_size(total))?;
        patch_u32(&mut file, 40, wav_format::data_chunk_size(data_bytes))?;
        file.flush().map_err(|e| StorageError(e.to_string()))?;
        drop(file);

        let checksum = sha256_file(&self.file_path)?;
        let duration_secs = self.format.duration_nanos(data_bytes as usize) as f64 / 1e9;
        log::info!(
            "WAV tap finished: {} bytes, {:.2}s, sha256 {}",
            total,
            duration_secs,
            checksum
        );

        Ok(TapSummary {
            path: self.file_path.clone(),
            format: self.format,
            started_at: self.started_at,
            bytes_written: total,
            checksum,
            duration_secs,
        })
    }
}

impl FrameSink for WavTapSink {
    fn accept(&self, bytes: &[u8], _timestamp_nanos: u64) -> Result<(), ForwardError> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(ForwardError::SinkUnavailable)?;
        if let Err(e) = writer.file.write_all(bytes) {
            log::error!("WAV tap write failed, closing {}: {}", self.file_path.display(), e);
            *guard = None;
            return Err(ForwardError::SinkUnavailable);
        }
        writer.data_bytes += bytes.len() as u64;
        Ok(())
    }
}

impl TapSummary {
    /// Write this summary as a JSON sidecar, `{recording}.summary.json`.
    pub fn write_sidecar(&self) -> Result<PathBuf, StorageError> {
        let sidecar = sidecar_path(&self.path);
        let json =
            serde_json::to_string_pretty(self).map_err(|e| StorageError(format!("failed to serialize summary: {}", e)))?;
        fs::write(&sidecar, json).map_err(|e| StorageError(format!("failed to write summary: {}", e)))?;
        Ok(sidecar)
    }

    pub fn read_sidecar(recording_path: &Path) -> Result<Self, StorageError> {
        let json = fs::read_to_string(sidecar_path(recording_path))
            .map_err(|e| StorageError(format!("failed to read summary: {}", e)))?;
        serde_json::from_str(&json).map_err(|e| StorageError(format!("failed to parse summary: {}", e)))
    }
}

fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("summary.json")
}

fn patch_u32(file: &mut File, offset: u64, value: u32) -> Result<(), StorageError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StorageError(e.to_string()))?;
    file.write_all(&value.to_le_bytes())
        .map_err(|e| StorageError(e.to_string()))
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, StorageError> {
    let data = fs::read(path).map_err(|e| StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::models::format::SampleEncoding;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("playback_capture_test_{}", name))
    }

    #[test]
    fn writes_playable_wav() {
        let path = temp_file_path("tap_plain.wav");
        let format = CaptureFormat {
            sample_rate: 48000,
            channels: 2,
            encoding: SampleEncoding::Pcm16,
        };

        let sink = WavTapSink::create(&path, format).unwrap();
        sink.accept(&[0u8; 16], 1).unwrap();
        sink.accept(&[1u8; 16], 2).unwrap();
        assert_eq!(sink.data_bytes(), 32);

        let summary = sink.finish().unwrap();
        assert_eq!(summary.bytes_written, 44 + 32);
        assert_eq!(summary.checksum.len(), 64);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 32);
        assert_eq!(&file_data[0..4], b"RIFF");
        assert_eq!(&file_data[8..12], b"WAVE");

        let chunk_size = u32::from_le_bytes([file_data[4], file_data[5], file_data[6], file_data[7]]);
        assert_eq!(chunk_size, 36 + 32);
        let data_size = u32::from_le_bytes([file_data[40], file_data[41], file_data[42], file_data[43]]);
        assert_eq!(data_size, 32);
        assert_eq!(&file_data[60..76], &[1u8; 16]);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn duration_follows_format() {
        let path = temp_file_path("tap_duration.wav");
        let format = CaptureFormat {
            sample_rate: 16000,
            channels: 1,
            encoding: SampleEncoding::Pcm16,
        };

        let sink = WavTapSink::create(&path, format).unwrap();
        // 8000 mono 16-bit frames at 16kHz
        sink.accept(&vec![0u8; 16000], 1).unwrap();
        let summary = sink.finish().unwrap();

        assert_relative_eq!(summary.duration_secs, 0.5, epsilon = 1e-9);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn checksum_matches_file_contents() {
        let path = temp_file_path("tap_checksum.wav");
        let sink = WavTapSink::create(&path, CaptureFormat::default()).unwrap();
        sink.accept(&[7u8; 8], 1).unwrap();
        let summary = sink.finish().unwrap();

        let expected = hex_encode(&Sha256::digest(fs::read(&path).unwrap()));
        assert_eq!(summary.checksum, expected);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn refuses_frames_after_finish() {
        let path = temp_file_path("tap_finished.wav");
        let sink = WavTapSink::create(&path, CaptureFormat::default()).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.accept(&[1, 2, 3, 4], 1), Err(ForwardError::SinkUnavailable));
        assert!(sink.finish().is_err());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn summary_sidecar_round_trips() {
        let path = temp_file_path("tap_sidecar.wav");
        let sink = WavTapSink::create(&path, CaptureFormat::default()).unwrap();
        sink.accept(&[0u8; 4], 1).unwrap();
        let summary = sink.finish().unwrap();

        let sidecar = summary.write_sidecar().unwrap();
        let restored = TapSummary::read_sidecar(&path).unwrap();
        assert_eq!(restored.checksum, summary.checksum);
        assert_eq!(restored.bytes_written, summary.bytes_written);
        assert_eq!(restored.format, summary.format);
        assert_eq!(restored.started_at, summary.started_at);
        assert_relative_eq!(restored.duration_secs, summary.duration_secs, epsilon = 1e-12);

        fs::remove_file(&sidecar).ok();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn records_a_controller_session() {
        use crate::grant::CaptureGrant;
        use crate::session::controller::CaptureController;
        use crate::testing::{wait_until, CountingAuthority, ScriptedBackend, Step};
        use std::sync::Arc;
        use std::time::Duration;

        let path = temp_file_path("tap_session.wav");
        let sink = Arc::new(WavTapSink::create(&path, CaptureFormat::default()).unwrap());
        let controller = CaptureController::builder(
            ScriptedBackend::new(vec![Step::Frame(vec![1; 8]), Step::Frame(vec![2; 8])]),
            CountingAuthority::new(),
            sink.clone(),
        )
        .spawn()
        .unwrap();

        controller.start(CaptureGrant::granted()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || sink.data_bytes() == 16));
        controller.stop().unwrap();

        let summary = sink.finish().unwrap();
        assert_eq!(summary.bytes_written, 44 + 16);
        fs::remove_file(&path).ok();
    }
}
