use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::command::{Command, SharedStatus};
use crate::models::error::{ForwardError, ReadError};
use crate::models::state::{FailureCause, SessionDiagnostics};
use crate::pipeline::device_pipeline::DevicePipeline;
use crate::pipeline::forwarder::FrameForwarder;
use crate::pipeline::stop_signal::StopSignal;
use crate::traits::capture_backend::CaptureDevice;
use crate::traits::session_delegate::SessionDelegate;

/// The blocking read loop of one session, run on its own thread.
///
/// Never touches session state. It forwards frames, bumps diagnostics, and
/// reports its own failure to the controller thread as a `LoopEnded` command.
pub(crate) struct CaptureLoop {
    pub generation: u64,
    pub stop: StopSignal,
    pub forwarder: FrameForwarder,
    pub delegate: Option<Arc<dyn SessionDelegate>>,
    pub status: Arc<Mutex<SharedStatus>>,
    pub events: Sender<Command>,
    pub transient_retry_limit: u32,
}

impl CaptureLoop {
    /// Runs until the stop signal is raised or the session fails, then hands
    /// the pipeline back so the controller can close it.
    pub fn run<D: CaptureDevice>(self, mut pipeline: DevicePipeline<D>) -> DevicePipeline<D> {
        log::info!("Capture loop started (generation {})", self.generation);
        let mut consecutive_transient = 0u32;

        let failure = loop {
            if self.stop.is_raised() {
                break None;
            }

            match pipeline.read_next() {
                Ok(frame) => {
                    consecutive_transient = 0;
                    let len = frame.len() as u64;
                    match self.forwarder.forward(&frame) {
                        Ok(()) => self.record(|d| {
                            d.frames_forwarded += 1;
                            d.bytes_forwarded += len;
                        }),
                        Err(ForwardError::SinkUnavailable) => {
                            log::error!("Sink went away at frame {}", frame.sequence);
                            self.notify_forward_error(&ForwardError::SinkUnavailable);
                            break Some(FailureCause::Sink(ForwardError::SinkUnavailable));
                        }
                        Err(err) => {
                            log::warn!("Frame {} not forwarded: {}", frame.sequence, err);
                            self.record(|d| d.forward_failures += 1);
                            self.notify_forward_error(&err);
                        }
                    }
                }
                Err(ReadError::Transient) => {
                    if self.stop.is_raised() {
                        break None;
                    }
                    consecutive_transient += 1;
                    self.record(|d| d.transient_reads += 1);
                    if consecutive_transient >= self.transient_retry_limit {
                        log::error!("Giving up after {} consecutive empty reads", consecutive_transient);
                        break Some(FailureCause::Read(ReadError::Fatal(format!(
                            "{} consecutive transient reads",
                            consecutive_transient
                        ))));
                    }
                }
                Err(err @ ReadError::Fatal(_)) => {
                    log::error!("Capture device failed: {}", err);
                    break Some(FailureCause::Read(err));
                }
            }
        };

        if let Some(cause) = failure {
            self.stop.raise();
            let ended = Command::LoopEnded {
                generation: self.generation,
                cause,
            };
            if self.events.send(ended).is_err() {
                log::warn!("Controller gone before capture loop {} reported its failure", self.generation);
            }
        }

        log::info!(
            "Capture loop stopped (generation {}, {} frames read)",
            self.generation,
            pipeline.frames_read()
        );
        pipeline
    }

    fn record(&self, update: impl FnOnce(&mut SessionDiagnostics)) {
        update(&mut self.status.lock().diagnostics);
    }

    fn notify_forward_error(&self, err: &ForwardError) {
        if let Some(delegate) = &self.delegate {
            delegate.on_forward_error(err);
        }
    }
}
