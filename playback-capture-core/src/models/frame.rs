/// One captured unit of audio.
///
/// The bytes are borrowed from the device pipeline's read buffer, so a frame
/// cannot outlive the next read. Sinks that need the data later must copy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFrame<'a> {
    pub bytes: &'a [u8],
    /// Monotonic capture time in nanoseconds since the pipeline was opened.
    pub timestamp_nanos: u64,
    /// Position of this frame within its session, starting at 0.
    pub sequence: u64,
}

impl AudioFrame<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
