use crate::bus::EventBus;
use crate::config::PipelineConfig;
use crate::session::SessionShared;
use caja_core::events::SessionEvent;
use caja_core::{ScanError, SessionId, SessionPhase, Strategy};
use caja_capture::{CameraConstraints, CameraDriver, CameraStream, CaptureError, VideoSink};
use caja_decode::{
    ContinuousDecoder, DecodeError, DecoderBackend, DetectorProbe, FrameDetector, ResultHandler,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

pub use crate::session::{DetectedHandler, ErrorHandler};

/// Manages the full lifecycle of barcode scan attempts against one
/// camera/sink pair. At most one session is active at a time; a finished
/// session is replaced by calling [`ScannerPipeline::start`] again.
pub struct ScannerPipeline {
    driver: Arc<dyn CameraDriver>,
    probe: Arc<dyn DetectorProbe>,
    fallback: Arc<dyn ContinuousDecoder>,
    sink: Arc<dyn VideoSink>,
    config: PipelineConfig,
    bus: EventBus,
    session: Mutex<Option<Arc<SessionShared>>>,
}

impl ScannerPipeline {
    pub fn new(
        driver: Arc<dyn CameraDriver>,
        probe: Arc<dyn DetectorProbe>,
        fallback: Arc<dyn ContinuousDecoder>,
        sink: Arc<dyn VideoSink>,
        config: PipelineConfig,
    ) -> Self {
        let bus = EventBus::new(config.event_channel_capacity);
        Self {
            driver,
            probe,
            fallback,
            sink,
            config,
            bus,
            session: Mutex::new(None),
        }
    }

    /// Begins a scan session. Initialization (capability probe,
    /// permission prompt, backend construction) runs on a spawned task;
    /// failures there are reported through `on_error`, never here. The
    /// only start-time error is an earlier session that has not finished
    /// releasing its resources.
    ///
    /// `on_detected` is invoked at most once per session, with a
    /// non-empty decoded value, after all resources are released.
    pub fn start(
        &self,
        on_detected: DetectedHandler,
        on_error: Option<ErrorHandler>,
    ) -> Result<SessionId, ScanError> {
        let mut slot = self
            .session
            .lock()
            .expect("pipeline session lock must be available");
        if let Some(session) = slot.as_ref() {
            if session.phase() != SessionPhase::Stopped {
                return Err(ScanError::SessionActive);
            }
        }

        let session = SessionShared::new(
            SessionId::generate(),
            self.bus.clone(),
            on_detected,
            on_error,
        );
        session.set_phase(SessionPhase::Initializing);
        *slot = Some(Arc::clone(&session));
        drop(slot);

        info!(session_id = %session.id(), "scan session starting");
        let init = tokio::spawn(initialize(
            Arc::clone(&session),
            Arc::clone(&self.driver),
            Arc::clone(&self.probe),
            Arc::clone(&self.fallback),
            Arc::clone(&self.sink),
            self.config.clone(),
        ));
        session.with_resources(|res| res.init_task = Some(init));
        if session.is_terminal() {
            session.release_resources();
        }
        Ok(session.id().clone())
    }

    /// Cancels the active session, if any. Idempotent; callable from any
    /// state, including mid-initialization, and always leaves camera and
    /// decoder released.
    pub fn stop(&self) {
        let session = self
            .session
            .lock()
            .expect("pipeline session lock must be available")
            .clone();
        if let Some(session) = session {
            session.stop();
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.session
            .lock()
            .expect("pipeline session lock must be available")
            .as_ref()
            .map_or(SessionPhase::Idle, |session| session.phase())
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == SessionPhase::Initializing
    }

    pub fn last_error(&self) -> Option<String> {
        self.session
            .lock()
            .expect("pipeline session lock must be available")
            .as_ref()
            .and_then(|session| session.last_error())
    }

    /// Phase watch for the current session, if one was ever started.
    pub fn watch_phase(&self) -> Option<watch::Receiver<SessionPhase>> {
        self.session
            .lock()
            .expect("pipeline session lock must be available")
            .as_ref()
            .map(|session| session.watch_phase())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }
}

/// Capability probe and strategy selection, then hand-off to whichever
/// backend was chosen. Runs once per session on its own task.
async fn initialize(
    session: Arc<SessionShared>,
    driver: Arc<dyn CameraDriver>,
    probe: Arc<dyn DetectorProbe>,
    fallback: Arc<dyn ContinuousDecoder>,
    sink: Arc<dyn VideoSink>,
    config: PipelineConfig,
) {
    match probe.supported_formats().await {
        Some(formats) => {
            start_native(session, driver, probe, sink, config, formats).await;
        }
        None => {
            info!("native detector absent; selecting fallback decoder");
            start_fallback(session, fallback, sink);
        }
    }
}

async fn start_native(
    session: Arc<SessionShared>,
    driver: Arc<dyn CameraDriver>,
    probe: Arc<dyn DetectorProbe>,
    sink: Arc<dyn VideoSink>,
    config: PipelineConfig,
    formats: Vec<caja_core::BarcodeFormat>,
) {
    if session.is_terminal() {
        return;
    }
    if formats.is_empty() {
        session.fail(ScanError::DecoderInit(
            "native capability reports zero supported formats".to_string(),
        ));
        return;
    }

    let detector = match probe.build(&formats).await {
        Ok(detector) => detector,
        Err(err) => {
            session.fail(ScanError::DecoderInit(err.to_string()));
            return;
        }
    };
    if session.is_terminal() {
        return;
    }

    let constraints = CameraConstraints {
        facing: config.facing,
    };
    let camera = match driver.open(&constraints).await {
        Ok(camera) => camera,
        Err(err) => {
            session.fail(map_capture_error(err));
            return;
        }
    };
    if session.is_terminal() {
        // stop() won the race while the permission prompt was resolving
        camera.stop();
        return;
    }

    sink.attach();
    session.with_resources(|res| {
        res.camera = Some(Arc::clone(&camera));
        res.sink = Some(Arc::clone(&sink));
        res.backend = Some(DecoderBackend::Native(Arc::clone(&detector)));
    });
    if session.is_terminal() {
        session.release_resources();
        return;
    }

    session.mark_scanning(Strategy::NativeDetector);
    let interval = Duration::from_millis(config.scan_interval_ms);
    let loop_session = Arc::clone(&session);
    let handle = tokio::spawn(sample_loop(loop_session, camera, detector, interval));
    session.with_resources(|res| res.loop_task = Some(handle));
    if session.is_terminal() {
        session.release_resources();
    }
}

/// Per-frame sampling loop for the native strategy. Frames arrive at
/// display rate; a decode attempt only runs when `interval` has elapsed
/// since the previous one. Transient decode failures are logged and the
/// loop continues; only a successful decode or cancellation ends it.
async fn sample_loop(
    session: Arc<SessionShared>,
    camera: Arc<dyn CameraStream>,
    detector: Arc<dyn FrameDetector>,
    interval: Duration,
) {
    let mut last_attempt: Option<Instant> = None;
    loop {
        let frame = match camera.next_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                session.fail(ScanError::DeviceUnavailable(err.to_string()));
                return;
            }
        };
        if session.is_terminal() {
            return;
        }
        if let Some(previous) = last_attempt {
            if previous.elapsed() < interval {
                continue;
            }
        }
        last_attempt = Some(Instant::now());

        match detector.detect(&frame).await {
            Ok(candidates) => {
                // Only the first candidate in a frame counts; an empty
                // value there means the frame is retried, not the rest
                // of the candidate list.
                if let Some(code) = candidates.into_iter().next() {
                    if !code.raw_value.is_empty() {
                        session.complete_detected(code.raw_value);
                        return;
                    }
                }
            }
            Err(DecodeError::NotFound) => {}
            Err(err) => warn!(error = %err, "transient decode failure; continuing"),
        }
    }
}

/// Fallback strategy: the decoder owns the sampling loop; we only wire
/// a guarded result handler and keep the control handle for teardown.
fn start_fallback(
    session: Arc<SessionShared>,
    fallback: Arc<dyn ContinuousDecoder>,
    sink: Arc<dyn VideoSink>,
) {
    if session.is_terminal() {
        return;
    }

    let handler_session = Arc::clone(&session);
    let handler: ResultHandler = Arc::new(move |result| match result {
        Ok(code) => {
            if code.raw_value.is_empty() {
                return;
            }
            handler_session.complete_detected(code.raw_value);
        }
        Err(DecodeError::NotFound) => {}
        Err(err) => warn!(error = %err, "fallback decode error"),
    });

    match fallback.start(Arc::clone(&sink), handler) {
        Ok(controls) => {
            session.with_resources(|res| {
                res.sink = Some(sink);
                res.backend = Some(DecoderBackend::Fallback {
                    decoder: fallback,
                    controls: Some(controls),
                });
            });
            // a detection or stop() may already have raced the commit
            if session.is_terminal() {
                session.release_resources();
                return;
            }
            session.mark_scanning(Strategy::FallbackDecoder);
        }
        Err(err) => session.fail(ScanError::DecoderInit(err.to_string())),
    }
}

fn map_capture_error(err: CaptureError) -> ScanError {
    match err {
        CaptureError::PermissionDenied(message) => ScanError::PermissionDenied(message),
        CaptureError::NoDevice(message) => ScanError::DeviceUnavailable(message),
        CaptureError::StreamEnded => {
            ScanError::DeviceUnavailable("camera stream ended".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DetectedHandler, ErrorHandler, ScannerPipeline};
    use crate::config::PipelineConfig;
    use caja_core::{BarcodeFormat, DetectedCode, ScanError, SessionPhase};
    use caja_capture::drivers::{
        AbsentCamera, DeniedCamera, RecordingSink, SimulatedCamera, UnresponsiveCamera,
    };
    use caja_capture::CameraDriver;
    use caja_decode::simulated::{ScriptedContinuousDecoder, SimulatedProbe};
    use caja_decode::{ContinuousDecoder, DecodeError, DetectorProbe};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            // no throttling in tests: every simulated frame is eligible
            scan_interval_ms: 0,
            ..PipelineConfig::default()
        }
    }

    fn recording_handler() -> (DetectedHandler, Arc<Mutex<Vec<String>>>) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let handler: DetectedHandler = Box::new(move |code| {
            sink.lock().expect("detected log lock must be available").push(code);
        });
        (handler, log)
    }

    fn recording_error_handler() -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let handler: ErrorHandler = Box::new(move |message| {
            sink.lock().expect("error log lock must be available").push(message);
        });
        (handler, log)
    }

    fn pipeline_with(
        driver: Arc<dyn CameraDriver>,
        probe: Arc<dyn DetectorProbe>,
        fallback: Arc<dyn ContinuousDecoder>,
        sink: Arc<RecordingSink>,
    ) -> ScannerPipeline {
        ScannerPipeline::new(driver, probe, fallback, sink, test_config())
    }

    async fn wait_for_stopped(pipeline: &ScannerPipeline) {
        let mut rx = pipeline
            .watch_phase()
            .expect("a session should expose a phase watch");
        timeout(
            Duration::from_secs(1),
            rx.wait_for(|phase| *phase == SessionPhase::Stopped),
        )
        .await
        .expect("session should reach stopped in time")
        .expect("phase channel should stay open");
    }

    async fn wait_until(what: &str, check: impl Fn() -> bool) {
        timeout(Duration::from_secs(1), async {
            while !check() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting until {what}"));
    }

    #[tokio::test]
    async fn native_strategy_detects_on_fifth_sampled_frame() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(12, 640, 480));
        let probe = Arc::new(SimulatedProbe::scripted(
            vec![BarcodeFormat::Ean13],
            vec![
                Ok(vec![]),
                Ok(vec![]),
                Ok(vec![]),
                Ok(vec![]),
                Ok(vec![DetectedCode::new(
                    "7501234567890",
                    Some(BarcodeFormat::Ean13),
                )]),
            ],
        ));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera.clone(), probe.clone(), fallback, sink.clone());

        let (on_detected, detected) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");

        wait_for_stopped(&pipeline).await;

        assert_eq!(
            *detected.lock().expect("detected log lock must be available"),
            vec!["7501234567890".to_string()]
        );
        assert!(errors.lock().expect("error log lock must be available").is_empty());
        assert_eq!(probe.detect_calls(), 5, "no frame is sampled after detection");
        assert!(!camera.is_live());
        assert_eq!(camera.stop_calls(), 1);
        assert!(!sink.is_attached());
        wait_until("the native detector handle is dropped", || {
            probe.detectors_released() == 1
        })
        .await;
    }

    #[tokio::test]
    async fn fallback_ignores_not_found_then_detects_once() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(0, 640, 480));
        let probe = Arc::new(SimulatedProbe::absent());
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![
            Err(DecodeError::NotFound),
            Ok(DetectedCode::new("012345678905", None)),
            Ok(DetectedCode::new("9999999999999", None)),
        ]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera, probe, fallback.clone(), sink.clone());

        let (on_detected, detected) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");

        wait_for_stopped(&pipeline).await;

        assert_eq!(
            *detected.lock().expect("detected log lock must be available"),
            vec!["012345678905".to_string()],
            "only the first real result may be reported"
        );
        assert!(errors.lock().expect("error log lock must be available").is_empty());
        wait_until("fallback controls are stopped", || fallback.stop_calls() >= 1).await;
        assert_eq!(fallback.reset_calls(), 1);
        assert!(!sink.is_attached());
    }

    #[tokio::test]
    async fn permission_denied_reports_error_and_never_detects() {
        let probe = Arc::new(SimulatedProbe::with_formats(vec![BarcodeFormat::Ean13]));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(Arc::new(DeniedCamera), probe, fallback, sink.clone());

        let (on_detected, detected) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");

        wait_for_stopped(&pipeline).await;

        let errors = errors.lock().expect("error log lock must be available");
        assert_eq!(errors.len(), 1);
        assert!(
            errors[0].contains("permission denied"),
            "message should be descriptive, got {:?}",
            errors[0]
        );
        assert!(detected.lock().expect("detected log lock must be available").is_empty());
        assert_eq!(
            pipeline.last_error().expect("error should be recorded"),
            errors[0]
        );
        assert!(!sink.is_attached(), "no partial resource may be retained");
    }

    #[tokio::test]
    async fn absent_device_reports_device_unavailable() {
        let probe = Arc::new(SimulatedProbe::with_formats(vec![BarcodeFormat::Ean13]));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(Arc::new(AbsentCamera), probe, fallback, sink);

        let (on_detected, _) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");

        wait_for_stopped(&pipeline).await;
        assert!(errors.lock().expect("error log lock must be available")[0]
            .contains("camera unavailable"));
    }

    #[tokio::test]
    async fn zero_supported_formats_is_a_decoder_init_failure() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(1, 640, 480));
        let probe = Arc::new(SimulatedProbe::with_formats(vec![]));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera.clone(), probe, fallback, sink);

        let (on_detected, detected) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");

        wait_for_stopped(&pipeline).await;
        assert!(errors.lock().expect("error log lock must be available")[0]
            .contains("decoder initialization failed"));
        assert!(detected.lock().expect("detected log lock must be available").is_empty());
        assert!(!camera.is_live(), "camera must never have been acquired");
    }

    #[tokio::test]
    async fn fallback_init_failure_is_session_fatal() {
        let probe = Arc::new(SimulatedProbe::absent());
        let fallback = Arc::new(ScriptedContinuousDecoder::failing_init("setup threw"));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(
            Arc::new(SimulatedCamera::with_blank_frames(0, 640, 480)),
            probe,
            fallback,
            sink,
        );

        let (on_detected, _) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");

        wait_for_stopped(&pipeline).await;
        let errors = errors.lock().expect("error log lock must be available");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("setup threw"));
    }

    #[tokio::test]
    async fn stop_before_initialization_completes_suppresses_callbacks() {
        let probe = Arc::new(SimulatedProbe::with_formats(vec![BarcodeFormat::Ean13]));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(Arc::new(UnresponsiveCamera), probe, fallback, sink.clone());

        let (on_detected, detected) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");
        assert!(pipeline.is_loading());

        pipeline.stop();

        assert_eq!(pipeline.phase(), SessionPhase::Stopped);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(detected.lock().expect("detected log lock must be available").is_empty());
        assert!(errors.lock().expect("error log lock must be available").is_empty());
        assert!(!sink.is_attached());
    }

    #[tokio::test]
    async fn stop_twice_is_a_no_op_the_second_time() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(4, 640, 480));
        let probe = Arc::new(SimulatedProbe::with_formats(vec![BarcodeFormat::Ean13]));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera.clone(), probe, fallback, sink.clone());

        let (on_detected, _) = recording_handler();
        pipeline
            .start(on_detected, None)
            .expect("session should start");
        let mut rx = pipeline
            .watch_phase()
            .expect("session should expose a phase watch");
        timeout(
            Duration::from_secs(1),
            rx.wait_for(|phase| *phase == SessionPhase::Scanning),
        )
        .await
        .expect("session should begin scanning in time")
        .expect("phase channel should stay open");

        pipeline.stop();
        pipeline.stop();

        assert_eq!(camera.stop_calls(), 1, "tracks are stopped exactly once");
        assert_eq!(sink.detach_calls(), 1, "sink is detached exactly once");
        assert_eq!(pipeline.phase(), SessionPhase::Stopped);
    }

    #[tokio::test]
    async fn stop_after_natural_completion_releases_nothing_again() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(2, 640, 480));
        let probe = Arc::new(SimulatedProbe::scripted(
            vec![BarcodeFormat::Ean13],
            vec![Ok(vec![DetectedCode::new("7501234567890", None)])],
        ));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera.clone(), probe, fallback, sink.clone());

        let (on_detected, detected) = recording_handler();
        pipeline
            .start(on_detected, None)
            .expect("session should start");
        wait_for_stopped(&pipeline).await;

        pipeline.stop();
        pipeline.stop();

        assert_eq!(camera.stop_calls(), 1);
        assert_eq!(sink.detach_calls(), 1);
        assert_eq!(
            detected.lock().expect("detected log lock must be available").len(),
            1
        );
    }

    #[tokio::test]
    async fn detection_with_empty_raw_value_keeps_scanning() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(6, 640, 480));
        let probe = Arc::new(SimulatedProbe::scripted(
            vec![BarcodeFormat::Ean13],
            vec![
                Ok(vec![DetectedCode::new("", None)]),
                Ok(vec![DetectedCode::new("7501234567890", None)]),
            ],
        ));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera, probe, fallback, sink);

        let (on_detected, detected) = recording_handler();
        pipeline
            .start(on_detected, None)
            .expect("session should start");
        wait_for_stopped(&pipeline).await;

        assert_eq!(
            *detected.lock().expect("detected log lock must be available"),
            vec!["7501234567890".to_string()]
        );
    }

    #[tokio::test]
    async fn only_the_first_candidate_of_a_frame_is_considered() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(6, 640, 480));
        let probe = Arc::new(SimulatedProbe::scripted(
            vec![BarcodeFormat::Ean13],
            vec![
                Ok(vec![
                    DetectedCode::new("", None),
                    DetectedCode::new("9999999999999", None),
                ]),
                Ok(vec![DetectedCode::new("7501234567890", None)]),
            ],
        ));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera, probe, fallback, sink);

        let (on_detected, detected) = recording_handler();
        pipeline
            .start(on_detected, None)
            .expect("session should start");
        wait_for_stopped(&pipeline).await;

        assert_eq!(
            *detected.lock().expect("detected log lock must be available"),
            vec!["7501234567890".to_string()],
            "a later candidate in the same frame must not be promoted"
        );
    }

    #[tokio::test]
    async fn transient_decode_failures_do_not_end_the_session() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(6, 640, 480));
        let probe = Arc::new(SimulatedProbe::scripted(
            vec![BarcodeFormat::Ean13],
            vec![
                Err(DecodeError::Transient("analysis hiccup".to_string())),
                Err(DecodeError::NotFound),
                Ok(vec![DetectedCode::new("7501234567890", None)]),
            ],
        ));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera, probe, fallback, sink);

        let (on_detected, detected) = recording_handler();
        let (on_error, errors) = recording_error_handler();
        pipeline
            .start(on_detected, Some(on_error))
            .expect("session should start");
        wait_for_stopped(&pipeline).await;

        assert_eq!(
            *detected.lock().expect("detected log lock must be available"),
            vec!["7501234567890".to_string()]
        );
        assert!(errors.lock().expect("error log lock must be available").is_empty());
    }

    #[tokio::test]
    async fn second_start_while_active_is_rejected() {
        let probe = Arc::new(SimulatedProbe::with_formats(vec![BarcodeFormat::Ean13]));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(Arc::new(UnresponsiveCamera), probe, fallback, sink);

        let (on_detected, _) = recording_handler();
        pipeline
            .start(on_detected, None)
            .expect("first session should start");

        let (on_detected, _) = recording_handler();
        let err = pipeline
            .start(on_detected, None)
            .expect_err("second start must be rejected");
        assert_eq!(err, ScanError::SessionActive);

        pipeline.stop();
        let (on_detected, _) = recording_handler();
        pipeline
            .start(on_detected, None)
            .expect("a stopped pipeline accepts a new session");
        pipeline.stop();
    }

    #[tokio::test]
    async fn session_events_cover_the_full_lifecycle() {
        let camera = Arc::new(SimulatedCamera::with_blank_frames(2, 640, 480));
        let probe = Arc::new(SimulatedProbe::scripted(
            vec![BarcodeFormat::Ean13],
            vec![Ok(vec![DetectedCode::new("7501234567890", None)])],
        ));
        let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![]));
        let sink = Arc::new(RecordingSink::new());
        let pipeline = pipeline_with(camera, probe, fallback, sink);
        let mut rx = pipeline.subscribe();

        let (on_detected, _) = recording_handler();
        let session_id = pipeline
            .start(on_detected, None)
            .expect("session should start");
        wait_for_stopped(&pipeline).await;

        let started = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("started event should arrive")
            .expect("bus should be open");
        assert!(matches!(
            started,
            caja_core::events::SessionEvent::SessionStarted { .. }
        ));
        assert_eq!(started.session_id(), &session_id);

        let detected = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("detected event should arrive")
            .expect("bus should be open");
        match detected {
            caja_core::events::SessionEvent::CodeDetected { raw_value, .. } => {
                assert_eq!(raw_value, "7501234567890");
            }
            other => panic!("expected CodeDetected, got {other:?}"),
        }

        let stopped = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("stopped event should arrive")
            .expect("bus should be open");
        assert!(matches!(
            stopped,
            caja_core::events::SessionEvent::SessionStopped { .. }
        ));
    }
}
