/// WAV file format utilities.
///
/// Generates standard 44-byte RIFF WAV headers for a [`CaptureFormat`] and
/// patches the size fields once the amount of audio is known.
use crate::models::format::CaptureFormat;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Generate a 44-byte WAV RIFF header, little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (format chunk size)
/// [20-21]  format code: 1 integer PCM, 3 IEEE float
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &CaptureFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let bit_depth = format.encoding.bits_per_sample();
    let block_align = format.bytes_per_frame() as u16;
    let byte_rate = format.sample_rate * u32::from(block_align);
    let format_code = if format.encoding.is_float() {
        FORMAT_IEEE_FLOAT
    } else {
        FORMAT_PCM
    };
    let chunk_size = 36u32.saturating_add(data_size);

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&format_code.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// RIFF chunk size stored at offset 4 for a file of `total_file_size` bytes.
/// Saturates at `u32::MAX` for files past the 4 GiB WAV limit.
pub fn riff_chunk_size(total_file_size: u64) -> u32 {
    u32::try_from(total_file_size.saturating_sub(8)).unwrap_or(u32::MAX)
}

/// Data chunk size stored at offset 40.
pub fn data_chunk_size(data_size: u64) -> u32 {
    u32::try_from(data_size).unwrap_or(u32::MAX)
}
