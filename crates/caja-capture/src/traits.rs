use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("no capture device found: {0}")]
    NoDevice(String),
    #[error("camera stream ended")]
    StreamEnded,
}

/// Which camera to prefer when the host has more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Environment,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub facing: Facing,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
        }
    }
}

/// One sampled video frame, as 8-bit luma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Self {
        Self { width, height, luma }
    }

    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; (width * height) as usize])
    }
}

/// Pluggable camera driver. `open` models the permission request: it
/// suspends until the user grants or denies access, with no imposed
/// timeout, and only hands out a live stream on grant.
#[async_trait]
pub trait CameraDriver: Send + Sync {
    async fn open(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Arc<dyn CameraStream>, CaptureError>;
}

/// Exclusive handle on a live camera stream.
#[async_trait]
pub trait CameraStream: Send + Sync {
    /// Waits for the next frame. Pends indefinitely when the device has
    /// no new frame to offer.
    async fn next_frame(&self) -> Result<Frame, CaptureError>;

    /// Stops every track on the stream. Idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// The caller's preview surface. The pipeline attaches and detaches it;
/// rendering is entirely the caller's concern.
pub trait VideoSink: Send + Sync {
    fn attach(&self);
    fn detach(&self);
}
