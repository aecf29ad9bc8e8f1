use async_trait::async_trait;
use caja_core::{BarcodeFormat, DetectedCode};
use caja_capture::{Frame, VideoSink};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// No barcode in the analyzed frame. Expected during scanning and
    /// never surfaced to the caller.
    #[error("no barcode found")]
    NotFound,
    /// Single-frame analysis failure. Logged, loop continues.
    #[error("transient decode failure: {0}")]
    Transient(String),
    /// Backend construction failed. Session-fatal.
    #[error("decoder initialization failed: {0}")]
    Init(String),
}

/// Probe for the host's native barcode-detection capability.
#[async_trait]
pub trait DetectorProbe: Send + Sync {
    /// `None` means the capability is absent and the fallback strategy
    /// applies. `Some(vec![])` means present but useless; callers treat
    /// that as an init failure.
    async fn supported_formats(&self) -> Option<Vec<BarcodeFormat>>;

    async fn build(
        &self,
        formats: &[BarcodeFormat],
    ) -> Result<Arc<dyn FrameDetector>, DecodeError>;
}

/// Native detector: decodes one submitted frame at a time.
#[async_trait]
pub trait FrameDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<DetectedCode>, DecodeError>;
}

pub type ResultHandler = Arc<dyn Fn(Result<DetectedCode, DecodeError>) + Send + Sync>;

/// Fallback decoder: owns its sampling loop. `start` binds the decoder
/// to the live sink and invokes the handler repeatedly, `NotFound`
/// included, until the returned controls are stopped.
pub trait ContinuousDecoder: Send + Sync {
    fn start(
        &self,
        sink: Arc<dyn VideoSink>,
        handler: ResultHandler,
    ) -> Result<Box<dyn DecodeControls>, DecodeError>;

    /// Resets internal decode state. Idempotent.
    fn reset(&self);
}

/// Invalidation handle for an in-flight continuous decode.
pub trait DecodeControls: Send + Sync {
    fn stop(&self);
}
