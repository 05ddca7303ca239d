//! Instrumented collaborators for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::grant::{GrantAuthority, GrantId, HeldGrant};
use crate::models::config::CaptureConfiguration;
use crate::models::error::{ForwardError, OpenError, ReadError};
use crate::models::state::SessionState;
use crate::pipeline::stop_signal::StopSignal;
use crate::traits::capture_backend::{CaptureBackend, CaptureDevice};
use crate::traits::frame_sink::FrameSink;
use crate::traits::presence::{PresenceHooks, StatusNotice};
use crate::traits::session_delegate::SessionDelegate;

/// One scripted device read.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Vec<u8>),
    Transient,
    Fatal,
}

#[derive(Debug, Default)]
pub struct DeviceCounters {
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl DeviceCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Backend whose devices replay a shared script, then wait for more steps
/// until the session's stop signal is raised.
pub struct ScriptedBackend {
    script: Arc<Mutex<VecDeque<Step>>>,
    counters: Arc<DeviceCounters>,
    open_error: Option<OpenError>,
    open_gate: Option<Receiver<()>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into())),
            counters: Arc::new(DeviceCounters::default()),
            open_error: None,
            open_gate: None,
        }
    }

    pub fn failing_open(error: OpenError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::new(vec![])
        }
    }

    /// Block every `open` until a message arrives on `gate`.
    pub fn with_open_gate(mut self, gate: Receiver<()>) -> Self {
        self.open_gate = Some(gate);
        self
    }

    pub fn counters(&self) -> Arc<DeviceCounters> {
        Arc::clone(&self.counters)
    }

    pub fn script(&self) -> Arc<Mutex<VecDeque<Step>>> {
        Arc::clone(&self.script)
    }
}

impl CaptureBackend for ScriptedBackend {
    type Device = ScriptedDevice;

    fn name(&self) -> &str {
        "scripted"
    }

    fn open(
        &mut self,
        _grant: &HeldGrant,
        _config: &CaptureConfiguration,
        _buffer_size: usize,
        stop: StopSignal,
    ) -> Result<ScriptedDevice, OpenError> {
        if let Some(gate) = &self.open_gate {
            let _ = gate.recv();
        }
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedDevice {
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
            stop,
        })
    }
}

pub struct ScriptedDevice {
    script: Arc<Mutex<VecDeque<Step>>>,
    counters: Arc<DeviceCounters>,
    stop: StopSignal,
}

impl CaptureDevice for ScriptedDevice {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ReadError> {
        loop {
            let step = self.script.lock().pop_front();
            match step {
                Some(Step::Frame(bytes)) => {
                    let len = bytes.len().min(buffer.len());
                    buffer[..len].copy_from_slice(&bytes[..len]);
                    return Ok(len);
                }
                Some(Step::Transient) => return Err(ReadError::Transient),
                Some(Step::Fatal) => return Err(ReadError::Fatal("scripted device failure".into())),
                None if self.stop.is_raised() => return Ok(0),
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
    }

    fn close(self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct CountingAuthority {
    revocations: AtomicUsize,
    dead: Mutex<HashSet<GrantId>>,
}

impl CountingAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn revocations(&self) -> usize {
        self.revocations.load(Ordering::SeqCst)
    }

    /// Make the host stop honoring `id`.
    pub fn kill(&self, id: GrantId) {
        self.dead.lock().insert(id);
    }
}

impl GrantAuthority for CountingAuthority {
    fn is_live(&self, id: GrantId) -> bool {
        !self.dead.lock().contains(&id)
    }

    fn revoke(&self, _id: GrantId) {
        self.revocations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that copies every accepted frame, or fails with a preset error.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<(Vec<u8>, u64)>>,
    failure: Mutex<Option<ForwardError>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, error: ForwardError) {
        *self.failure.lock() = Some(error);
    }

    pub fn frames(&self) -> Vec<(Vec<u8>, u64)> {
        self.frames.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl FrameSink for RecordingSink {
    fn accept(&self, bytes: &[u8], timestamp_nanos: u64) -> Result<(), ForwardError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        self.frames.lock().push((bytes.to_vec(), timestamp_nanos));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPresence {
    started: AtomicUsize,
    ended: AtomicUsize,
}

impl RecordingPresence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

impl PresenceHooks for RecordingPresence {
    fn on_session_started(&self, _notice: &StatusNotice) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_ended(&self) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}

/// Delegate that keeps every published state in order.
#[derive(Default)]
pub struct RecordingDelegate {
    states: Mutex<Vec<SessionState>>,
    forward_errors: AtomicUsize,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().clone()
    }

    pub fn forward_errors(&self) -> usize {
        self.forward_errors.load(Ordering::SeqCst)
    }
}

impl SessionDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: &SessionState, _generation: u64) {
        self.states.lock().push(state.clone());
    }

    fn on_forward_error(&self, _error: &ForwardError) {
        self.forward_errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}
