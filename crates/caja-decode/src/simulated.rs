//! Scripted decoder doubles for tests and the demo daemon.

use crate::traits::{
    ContinuousDecoder, DecodeControls, DecodeError, DetectorProbe, FrameDetector, ResultHandler,
};
use async_trait::async_trait;
use caja_core::{BarcodeFormat, DetectedCode};
use caja_capture::{Frame, VideoSink};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type DetectScript = VecDeque<Result<Vec<DetectedCode>, DecodeError>>;

/// Probe double standing in for the host capability. Detectors it builds
/// replay a per-call script; once exhausted they report empty results.
pub struct SimulatedProbe {
    formats: Option<Vec<BarcodeFormat>>,
    fail_build: Option<String>,
    script: Mutex<Option<DetectScript>>,
    detect_calls: Arc<AtomicUsize>,
    detectors_released: Arc<AtomicUsize>,
}

impl SimulatedProbe {
    /// Host without the native capability.
    pub fn absent() -> Self {
        Self {
            formats: None,
            fail_build: None,
            script: Mutex::new(None),
            detect_calls: Arc::new(AtomicUsize::new(0)),
            detectors_released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_formats(formats: Vec<BarcodeFormat>) -> Self {
        Self {
            formats: Some(formats),
            ..Self::absent()
        }
    }

    pub fn scripted(
        formats: Vec<BarcodeFormat>,
        script: Vec<Result<Vec<DetectedCode>, DecodeError>>,
    ) -> Self {
        Self {
            formats: Some(formats),
            script: Mutex::new(Some(script.into())),
            ..Self::absent()
        }
    }

    pub fn failing_build(formats: Vec<BarcodeFormat>, message: impl Into<String>) -> Self {
        Self {
            formats: Some(formats),
            fail_build: Some(message.into()),
            ..Self::absent()
        }
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn detectors_released(&self) -> usize {
        self.detectors_released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectorProbe for SimulatedProbe {
    async fn supported_formats(&self) -> Option<Vec<BarcodeFormat>> {
        self.formats.clone()
    }

    async fn build(
        &self,
        _formats: &[BarcodeFormat],
    ) -> Result<Arc<dyn FrameDetector>, DecodeError> {
        if let Some(message) = &self.fail_build {
            return Err(DecodeError::Init(message.clone()));
        }
        let script = self
            .script
            .lock()
            .expect("detect script lock must be available")
            .take()
            .unwrap_or_default();
        Ok(Arc::new(ScriptedDetector {
            script: Mutex::new(script),
            detect_calls: Arc::clone(&self.detect_calls),
            released: Arc::clone(&self.detectors_released),
        }))
    }
}

struct ScriptedDetector {
    script: Mutex<DetectScript>,
    detect_calls: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameDetector for ScriptedDetector {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedCode>, DecodeError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("detect script lock must be available")
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }
}

impl Drop for ScriptedDetector {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fallback decoder double. `start` attaches the sink and replays its
/// scripted results from a spawned task until stopped.
pub struct ScriptedContinuousDecoder {
    script: Mutex<Option<Vec<Result<DetectedCode, DecodeError>>>>,
    fail_init: Option<String>,
    stopped: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
    reset_calls: Arc<AtomicUsize>,
}

impl ScriptedContinuousDecoder {
    pub fn new(script: Vec<Result<DetectedCode, DecodeError>>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            fail_init: None,
            stopped: Arc::new(AtomicBool::new(false)),
            stop_calls: Arc::new(AtomicUsize::new(0)),
            reset_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_init(message: impl Into<String>) -> Self {
        Self {
            fail_init: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }
}

impl ContinuousDecoder for ScriptedContinuousDecoder {
    fn start(
        &self,
        sink: Arc<dyn VideoSink>,
        handler: ResultHandler,
    ) -> Result<Box<dyn DecodeControls>, DecodeError> {
        if let Some(message) = &self.fail_init {
            return Err(DecodeError::Init(message.clone()));
        }
        sink.attach();
        let script = self
            .script
            .lock()
            .expect("decode script lock must be available")
            .take()
            .unwrap_or_default();
        let stopped = Arc::clone(&self.stopped);
        tokio::spawn(async move {
            for result in script {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                handler(result);
                tokio::task::yield_now().await;
            }
        });
        Ok(Box::new(ScriptedControls {
            stopped: Arc::clone(&self.stopped),
            stop_calls: Arc::clone(&self.stop_calls),
        }))
    }

    fn reset(&self) {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedControls {
    stopped: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
}

impl DecodeControls for ScriptedControls {
    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }
}
