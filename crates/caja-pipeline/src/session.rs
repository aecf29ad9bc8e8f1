use crate::bus::EventBus;
use caja_core::events::SessionEvent;
use caja_core::{ScanError, SessionId, SessionPhase, Strategy};
use caja_capture::{CameraStream, VideoSink};
use caja_decode::DecoderBackend;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub type DetectedHandler = Box<dyn Fn(String) + Send + Sync>;
pub type ErrorHandler = Box<dyn Fn(String) + Send + Sync>;

/// Resources exclusively owned by the active session. Every slot is an
/// `Option` so each teardown step stays independently guarded. The
/// initialization task and the sampling loop get separate slots: the
/// init task may hand off to the loop before the pipeline has stored
/// the init handle, so sharing one slot would let the loop handle be
/// overwritten and the loop survive teardown.
#[derive(Default)]
pub(crate) struct Resources {
    pub init_task: Option<JoinHandle<()>>,
    pub loop_task: Option<JoinHandle<()>>,
    pub camera: Option<Arc<dyn CameraStream>>,
    pub sink: Option<Arc<dyn VideoSink>>,
    pub backend: Option<DecoderBackend>,
}

/// State shared between the pipeline handle, the initialization task,
/// the sampling loop, and decoder callbacks.
///
/// The `terminal` flag is the guard for every exit action: it is
/// checked-and-set (`swap`) before any terminal transition, so a late
/// decode result or a concurrent `stop()` can never report twice or
/// double-release.
pub(crate) struct SessionShared {
    id: SessionId,
    terminal: AtomicBool,
    phase_tx: watch::Sender<SessionPhase>,
    resources: Mutex<Resources>,
    last_error: Mutex<Option<String>>,
    on_detected: DetectedHandler,
    on_error: Option<ErrorHandler>,
    bus: EventBus,
}

impl SessionShared {
    pub fn new(
        id: SessionId,
        bus: EventBus,
        on_detected: DetectedHandler,
        on_error: Option<ErrorHandler>,
    ) -> Arc<Self> {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Arc::new(Self {
            id,
            terminal: AtomicBool::new(false),
            phase_tx,
            resources: Mutex::new(Resources::default()),
            last_error: Mutex::new(None),
            on_detected,
            on_error,
            bus,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .expect("session error lock must be available")
            .clone()
    }

    /// Advances the phase if the state machine allows it; illegal
    /// transitions are silently ignored (transitions are one-way).
    pub fn set_phase(&self, next: SessionPhase) {
        self.phase_tx.send_if_modified(|phase| {
            if phase.can_advance_to(next) {
                *phase = next;
                true
            } else {
                false
            }
        });
    }

    pub fn with_resources<R>(&self, f: impl FnOnce(&mut Resources) -> R) -> R {
        f(&mut self
            .resources
            .lock()
            .expect("session resources lock must be available"))
    }

    /// Marks the session live and announces the selected strategy.
    pub fn mark_scanning(&self, strategy: Strategy) {
        if self.is_terminal() {
            return;
        }
        self.set_phase(SessionPhase::Scanning);
        self.publish(SessionEvent::SessionStarted {
            session_id: self.id.clone(),
            strategy,
        });
    }

    /// Releases held resources in teardown order: pending tasks, camera
    /// tracks, video sink, decoder backend. Idempotent; the absence of
    /// one resource never prevents releasing another.
    pub fn release_resources(&self) {
        let (init_task, loop_task, camera, sink, backend) = self.with_resources(|res| {
            (
                res.init_task.take(),
                res.loop_task.take(),
                res.camera.take(),
                res.sink.take(),
                res.backend.take(),
            )
        });
        if let Some(task) = init_task {
            task.abort();
        }
        if let Some(task) = loop_task {
            task.abort();
        }
        if let Some(camera) = camera {
            camera.stop();
        }
        if let Some(sink) = sink {
            sink.detach();
        }
        if let Some(mut backend) = backend {
            backend.release();
        }
    }

    /// Caller-initiated cancellation. Safe from any state, any number of
    /// times, including before initialization completes. No callback
    /// fires after this returns.
    pub fn stop(&self) {
        let first = !self.terminal.swap(true, Ordering::SeqCst);
        self.release_resources();
        self.set_phase(SessionPhase::Stopped);
        if first {
            self.publish(SessionEvent::SessionStopped {
                session_id: self.id.clone(),
            });
        }
    }

    /// Terminal success. Resources are released before `on_detected`
    /// runs, so the caller may tear down its UI from inside the callback.
    pub fn complete_detected(&self, raw_value: String) {
        if self.terminal.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_phase(SessionPhase::Detected);
        self.release_resources();
        self.publish(SessionEvent::CodeDetected {
            session_id: self.id.clone(),
            raw_value: raw_value.clone(),
        });
        self.set_phase(SessionPhase::Stopped);
        self.publish(SessionEvent::SessionStopped {
            session_id: self.id.clone(),
        });
        (self.on_detected)(raw_value);
    }

    /// Terminal failure: errored, resources released, reported once.
    pub fn fail(&self, error: ScanError) {
        if self.terminal.swap(true, Ordering::SeqCst) {
            return;
        }
        let message = error.to_string();
        *self
            .last_error
            .lock()
            .expect("session error lock must be available") = Some(message.clone());
        self.set_phase(SessionPhase::Errored);
        self.release_resources();
        self.publish(SessionEvent::SessionFailed {
            session_id: self.id.clone(),
            message: message.clone(),
        });
        self.set_phase(SessionPhase::Stopped);
        self.publish(SessionEvent::SessionStopped {
            session_id: self.id.clone(),
        });
        if let Some(on_error) = &self.on_error {
            on_error(message);
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine; the bus is observability, not control.
        let _ = self.bus.publish(event);
    }
}
