//! Ready-made `FrameSink` implementations.

pub mod channel;
pub mod wav_tap;
