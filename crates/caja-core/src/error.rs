use thiserror::Error;

/// Session-fatal failures reported to the caller. Transient per-frame
/// decode failures never surface here; those live in the decode layer
/// and are absorbed by the sampling loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("decoder initialization failed: {0}")]
    DecoderInit(String),
    #[error("a scan session is already active")]
    SessionActive,
}

impl ScanError {
    /// Every variant ends the session; `SessionActive` is the only one
    /// that leaves the previous session untouched.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, ScanError::SessionActive)
    }
}
