use crate::models::error::ForwardError;

/// The downstream consumer of captured audio (the native media pipeline).
///
/// Called from the capture thread once per frame, in capture order. Must
/// accept or reject synchronously and must not keep `bytes` past the call;
/// the buffer is overwritten by the next read.
pub trait FrameSink: Send + Sync {
    fn accept(&self, bytes: &[u8], timestamp_nanos: u64) -> Result<(), ForwardError>;
}
