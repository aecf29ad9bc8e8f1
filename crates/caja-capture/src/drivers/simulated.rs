use crate::traits::{
    CameraConstraints, CameraDriver, CameraStream, CaptureError, Frame, VideoSink,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Simulated camera serving a scripted frame sequence. Once the script
/// is exhausted `next_frame` pends forever, like a live device with no
/// new frame to offer. Counters stay shared with the driver so tests
/// can assert release behavior after the stream changed hands.
pub struct SimulatedCamera {
    frames: Mutex<VecDeque<Frame>>,
    pacing: Duration,
    live: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
    frames_served: Arc<AtomicUsize>,
}

impl SimulatedCamera {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            pacing: Duration::ZERO,
            live: Arc::new(AtomicBool::new(false)),
            stop_calls: Arc::new(AtomicUsize::new(0)),
            frames_served: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_blank_frames(count: usize, width: u32, height: u32) -> Self {
        Self::new(vec![Frame::blank(width, height); count])
    }

    /// Delivers frames at a fixed cadence instead of immediately, like
    /// a real device tied to a refresh rate.
    pub fn paced(mut self, frame_interval: Duration) -> Self {
        self.pacing = frame_interval;
        self
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn frames_served(&self) -> usize {
        self.frames_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDriver for SimulatedCamera {
    async fn open(
        &self,
        _constraints: &CameraConstraints,
    ) -> Result<Arc<dyn CameraStream>, CaptureError> {
        let frames = std::mem::take(
            &mut *self
                .frames
                .lock()
                .expect("simulated frame queue lock must be available"),
        );
        self.live.store(true, Ordering::SeqCst);
        Ok(Arc::new(SimulatedStream {
            frames: Mutex::new(frames),
            pacing: self.pacing,
            live: Arc::clone(&self.live),
            stop_calls: Arc::clone(&self.stop_calls),
            frames_served: Arc::clone(&self.frames_served),
        }))
    }
}

struct SimulatedStream {
    frames: Mutex<VecDeque<Frame>>,
    pacing: Duration,
    live: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
    frames_served: Arc<AtomicUsize>,
}

#[async_trait]
impl CameraStream for SimulatedStream {
    async fn next_frame(&self) -> Result<Frame, CaptureError> {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
        let frame = self
            .frames
            .lock()
            .expect("simulated frame queue lock must be available")
            .pop_front();
        match frame {
            Some(frame) => {
                self.frames_served.fetch_add(1, Ordering::SeqCst);
                Ok(frame)
            }
            None => std::future::pending().await,
        }
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Driver whose permission prompt is refused.
pub struct DeniedCamera;

#[async_trait]
impl CameraDriver for DeniedCamera {
    async fn open(
        &self,
        _constraints: &CameraConstraints,
    ) -> Result<Arc<dyn CameraStream>, CaptureError> {
        Err(CaptureError::PermissionDenied(
            "user refused camera access".to_string(),
        ))
    }
}

/// Driver on a host with no capture device at all.
pub struct AbsentCamera;

#[async_trait]
impl CameraDriver for AbsentCamera {
    async fn open(
        &self,
        _constraints: &CameraConstraints,
    ) -> Result<Arc<dyn CameraStream>, CaptureError> {
        Err(CaptureError::NoDevice("no capture device".to_string()))
    }
}

/// Driver whose permission prompt is never answered; `open` pends until
/// the session is cancelled.
pub struct UnresponsiveCamera;

#[async_trait]
impl CameraDriver for UnresponsiveCamera {
    async fn open(
        &self,
        _constraints: &CameraConstraints,
    ) -> Result<Arc<dyn CameraStream>, CaptureError> {
        std::future::pending().await
    }
}

/// Sink double counting attach/detach calls.
#[derive(Default)]
pub struct RecordingSink {
    attached: AtomicBool,
    attach_calls: AtomicUsize,
    detach_calls: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }
}

impl VideoSink for RecordingSink {
    fn attach(&self) {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        self.attached.store(true, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        self.attached.store(false, Ordering::SeqCst);
    }
}
