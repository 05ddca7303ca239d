use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::models::error::ForwardError;
use crate::traits::frame_sink::FrameSink;

/// A frame copied out of the capture buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub bytes: Vec<u8>,
    pub timestamp_nanos: u64,
}

/// Queues owned copies of captured frames for a consumer thread.
///
/// Never blocks the capture thread: a full queue rejects the frame.
pub struct ChannelSink {
    sender: Sender<OwnedFrame>,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<OwnedFrame>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl FrameSink for ChannelSink {
    fn accept(&self, bytes: &[u8], timestamp_nanos: u64) -> Result<(), ForwardError> {
        let frame = OwnedFrame {
            bytes: bytes.to_vec(),
            timestamp_nanos,
        };
        match self.sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ForwardError::SinkRejected("frame queue full".into())),
            Err(TrySendError::Disconnected(_)) => Err(ForwardError::SinkUnavailable),
        }
    }
}
