use std::sync::Arc;

use crate::models::error::ForwardError;
use crate::models::frame::AudioFrame;
use crate::traits::frame_sink::FrameSink;

/// Hands captured frames across to the downstream sink.
#[derive(Clone)]
pub struct FrameForwarder {
    sink: Arc<dyn FrameSink>,
}

impl FrameForwarder {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self { sink }
    }

    pub fn forward(&self, frame: &AudioFrame<'_>) -> Result<(), ForwardError> {
        self.sink.accept(frame.bytes, frame.timestamp_nanos)
    }
}
