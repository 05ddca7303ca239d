use std::mem;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, SendError, Sender};
use parking_lot::Mutex;

use super::capture_loop::CaptureLoop;
use super::command::{Command, SharedStatus};
use crate::grant::{CaptureGrant, GrantAuthority, GrantHolder, HeldGrant};
use crate::models::config::CaptureConfiguration;
use crate::models::error::{SetupError, StartError, StopError};
use crate::models::state::{FailureCause, SessionDiagnostics, SessionState};
use crate::pipeline::device_pipeline::DevicePipeline;
use crate::pipeline::forwarder::FrameForwarder;
use crate::pipeline::stop_signal::StopSignal;
use crate::traits::capture_backend::{CaptureBackend, CaptureDevice};
use crate::traits::frame_sink::FrameSink;
use crate::traits::presence::{LogPresence, PresenceHooks};
use crate::traits::session_delegate::SessionDelegate;

/// Turns capture grants into running capture sessions.
///
/// Every state transition runs on one dedicated controller thread, fed
/// through a mailbox, so concurrent `start`/`stop` calls and capture-loop
/// failures are applied strictly one after another. The frames themselves
/// never pass through the mailbox: the capture thread forwards them directly
/// to the sink.
///
/// ```text
/// start/stop ─→ [mailbox] ─→ controller thread ──spawn/join──→ capture thread
///                   ↑                                             │
///                   └──────────── LoopEnded (failure) ────────────┤
///                                                                 └─→ FrameSink
/// ```
///
/// Dropping the controller ends any running session through the same
/// teardown as `stop`.
pub struct CaptureController {
    commands: Sender<Command>,
    status: Arc<Mutex<SharedStatus>>,
    actor: Option<thread::JoinHandle<()>>,
}

impl CaptureController {
    pub fn builder<B: CaptureBackend>(
        backend: B,
        authority: Arc<dyn GrantAuthority>,
        sink: Arc<dyn FrameSink>,
    ) -> ControllerBuilder<B> {
        ControllerBuilder {
            backend,
            authority,
            sink,
            presence: Arc::new(LogPresence),
            delegate: None,
            config: CaptureConfiguration::default(),
        }
    }

    /// Start a session with `grant`. Valid only while idle.
    ///
    /// A start made while another one is still in flight is rejected with
    /// `AlreadyActive` right away instead of waiting behind it. Blocks until the device is open and the capture thread is running, or
    /// until the attempt has failed and everything it acquired is released.
    pub fn start(&self, grant: CaptureGrant) -> Result<(), StartError> {
        {
            let mut status = self.status.lock();
            if status.start_pending || status.state.holds_resources() {
                log::warn!("Start rejected: session is {}", status.state.name());
                return Err(StartError::AlreadyActive);
            }
            status.start_pending = true;
        }

        let (reply, response) = crossbeam_channel::bounded(1);
        if self.commands.send(Command::Start { grant, reply }).is_err() {
            self.status.lock().start_pending = false;
            return Err(controller_gone());
        }
        response.recv().unwrap_or_else(|_| Err(controller_gone()))
    }

    /// Stop the running session, if any.
    ///
    /// A stop issued while a start is in flight waits for that start to
    /// resolve and then stops the session it produced. Returns once the
    /// device and grant are released.
    pub fn stop(&self) -> Result<(), StopError> {
        let (reply, done) = crossbeam_channel::bounded(1);
        if self.commands.send(Command::Stop { reply }).is_ok() {
            let _ = done.recv();
        }
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.status.lock().state.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.status.lock().state.is_recording()
    }

    /// Identifier of the latest start attempt (0 before the first one).
    pub fn generation(&self) -> u64 {
        self.status.lock().diagnostics.generation
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.status.lock().diagnostics.clone()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.actor.take() {
            if handle.join().is_err() {
                log::error!("Capture controller thread panicked");
            }
        }
    }
}

fn controller_gone() -> StartError {
    StartError::DeviceUnavailable("capture controller has shut down".into())
}

pub struct ControllerBuilder<B: CaptureBackend> {
    backend: B,
    authority: Arc<dyn GrantAuthority>,
    sink: Arc<dyn FrameSink>,
    presence: Arc<dyn PresenceHooks>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    config: CaptureConfiguration,
}

impl<B: CaptureBackend> ControllerBuilder<B> {
    pub fn presence(mut self, presence: Arc<dyn PresenceHooks>) -> Self {
        self.presence = presence;
        self
    }

    pub fn delegate(mut self, delegate: Arc<dyn SessionDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn config(mut self, config: CaptureConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn spawn(self) -> Result<CaptureController, SetupError> {
        self.config.validate().map_err(SetupError::InvalidConfig)?;

        let (commands, inbox) = crossbeam_channel::unbounded();
        let status = Arc::new(Mutex::new(SharedStatus::new()));

        let actor = ControllerActor {
            backend: self.backend,
            grants: GrantHolder::new(self.authority),
            forwarder: FrameForwarder::new(self.sink),
            presence: self.presence,
            delegate: self.delegate,
            config: self.config,
            status: Arc::clone(&status),
            events: commands.clone(),
            phase: Phase::Idle,
            generation: 0,
        };

        let handle = thread::Builder::new()
            .name("capture-controller".into())
            .spawn(move || actor.run(inbox))
            .map_err(|e| SetupError::SpawnFailed(e.to_string()))?;

        Ok(CaptureController {
            commands,
            status,
            actor: Some(handle),
        })
    }
}

/// Session resources. Only inhabited while a session is recording; during
/// acquiring and stopping they live in locals of the running handler.
enum Phase<D: CaptureDevice> {
    Idle,
    Recording(ActiveSession<D>),
}

struct ActiveSession<D: CaptureDevice> {
    generation: u64,
    grant: HeldGrant,
    stop: StopSignal,
    capture: thread::JoinHandle<Option<DevicePipeline<D>>>,
}

enum Ending {
    Requested,
    Failed(FailureCause),
    Shutdown,
}

struct ControllerActor<B: CaptureBackend> {
    backend: B,
    grants: GrantHolder,
    forwarder: FrameForwarder,
    presence: Arc<dyn PresenceHooks>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    config: CaptureConfiguration,
    status: Arc<Mutex<SharedStatus>>,
    events: Sender<Command>,
    phase: Phase<B::Device>,
    generation: u64,
}

impl<B: CaptureBackend> ControllerActor<B> {
    fn run(mut self, inbox: Receiver<Command>) {
        log::debug!("Capture controller started ({} backend)", self.backend.name());
        while let Ok(command) = inbox.recv() {
            match command {
                Command::Start { grant, reply } => {
                    let result = self.handle_start(grant);
                    self.status.lock().start_pending = false;
                    let _ = reply.send(result);
                }
                Command::Stop { reply } => {
                    self.teardown(Ending::Requested);
                    let _ = reply.send(());
                }
                Command::LoopEnded { generation, cause } => self.handle_loop_ended(generation, cause),
                Command::Shutdown => break,
            }
        }
        // Remaining teardown happens in Drop.
    }

    fn handle_start(&mut self, grant: CaptureGrant) -> Result<(), StartError> {
        if let Phase::Recording(session) = &self.phase {
            log::warn!("Start rejected: session {} is recording", session.generation);
            return Err(StartError::AlreadyActive);
        }

        self.generation += 1;
        let generation = self.generation;
        self.status.lock().diagnostics.generation = generation;
        self.publish(SessionState::Acquiring);

        let grant = match self.grants.acquire(grant) {
            Ok(grant) => grant,
            Err(err) => return Err(self.fail_start(err.into())),
        };

        let stop = StopSignal::new();
        let pipeline = match DevicePipeline::open(&mut self.backend, &grant, &self.config, stop.clone()) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                release_resources::<B::Device>(None, grant);
                return Err(self.fail_start(err.into()));
            }
        };

        let capture_loop = CaptureLoop {
            generation,
            stop: stop.clone(),
            forwarder: self.forwarder.clone(),
            delegate: self.delegate.clone(),
            status: Arc::clone(&self.status),
            events: self.events.clone(),
            transient_retry_limit: self.config.transient_retry_limit,
        };

        // The pipeline is handed over only once the thread exists, so a
        // failed spawn leaves it here to be closed.
        let (handoff, pending) = crossbeam_channel::bounded::<DevicePipeline<B::Device>>(1);
        let spawned = thread::Builder::new()
            .name(format!("capture-loop-{}", generation))
            .spawn(move || pending.recv().ok().map(|pipeline| capture_loop.run(pipeline)));

        let capture = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                release_resources(Some(pipeline), grant);
                return Err(self.fail_start(StartError::DeviceUnavailable(format!(
                    "failed to spawn capture thread: {}",
                    e
                ))));
            }
        };
        if let Err(SendError(pipeline)) = handoff.send(pipeline) {
            let _ = capture.join();
            release_resources(Some(pipeline), grant);
            return Err(self.fail_start(StartError::DeviceUnavailable(
                "capture thread exited before receiving the device".into(),
            )));
        }

        self.phase = Phase::Recording(ActiveSession {
            generation,
            grant,
            stop,
            capture,
        });
        self.status.lock().diagnostics.sessions_started += 1;
        self.publish(SessionState::Recording);
        self.presence.on_session_started(&self.config.notice);
        log::info!("Capture session {} recording", generation);
        Ok(())
    }

    fn handle_loop_ended(&mut self, generation: u64, cause: FailureCause) {
        match &self.phase {
            Phase::Recording(session) if session.generation == generation => {
                self.teardown(Ending::Failed(cause));
            }
            _ => log::debug!("Ignoring end of superseded capture loop {}", generation),
        }
    }

    /// The one exit path of a recording session. A second entry finds the
    /// phase idle and does nothing.
    fn teardown(&mut self, ending: Ending) {
        let ActiveSession {
            generation,
            grant,
            stop,
            capture,
        } = match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => return,
            Phase::Recording(session) => session,
        };

        match &ending {
            Ending::Requested => log::info!("Stopping capture session {}", generation),
            Ending::Failed(cause) => log::warn!("Capture session {} failed: {:?}", generation, cause),
            Ending::Shutdown => log::warn!("Controller shutting down with session {} active", generation),
        }

        self.publish(SessionState::Stopping);
        stop.raise();
        let pipeline = match capture.join() {
            Ok(pipeline) => pipeline,
            Err(_) => {
                log::error!("Capture thread of session {} panicked; device dropped unclosed", generation);
                None
            }
        };
        release_resources(pipeline, grant);
        self.presence.on_session_ended();

        if let Ending::Failed(cause) = ending {
            self.publish(SessionState::Failed(cause));
        }
        self.publish(SessionState::Idle);
        log::info!("Capture session {} ended", generation);
    }

    fn fail_start(&self, err: StartError) -> StartError {
        log::error!("Capture session {} failed to start: {}", self.generation, err);
        self.publish(SessionState::Failed(FailureCause::Start(err.clone())));
        self.publish(SessionState::Idle);
        err
    }

    fn publish(&self, state: SessionState) {
        self.status.lock().state = state.clone();
        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(&state, self.generation);
        }
    }
}

impl<B: CaptureBackend> Drop for ControllerActor<B> {
    fn drop(&mut self) {
        self.teardown(Ending::Shutdown);
    }
}

/// Release what a session acquired: device first, then grant.
fn release_resources<D: CaptureDevice>(pipeline: Option<DevicePipeline<D>>, grant: HeldGrant) {
    if let Some(pipeline) = pipeline {
        pipeline.close();
    }
    grant.release();
}
