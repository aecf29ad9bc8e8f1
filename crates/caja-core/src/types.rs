use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Barcode symbologies the pipeline understands. Capability probes report
/// supported formats as strings; `parse` drops anything unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code39,
    Code128,
    Itf,
    QrCode,
    DataMatrix,
}

impl BarcodeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::Ean13 => "ean_13",
            BarcodeFormat::Ean8 => "ean_8",
            BarcodeFormat::UpcA => "upc_a",
            BarcodeFormat::UpcE => "upc_e",
            BarcodeFormat::Code39 => "code_39",
            BarcodeFormat::Code128 => "code_128",
            BarcodeFormat::Itf => "itf",
            BarcodeFormat::QrCode => "qr_code",
            BarcodeFormat::DataMatrix => "data_matrix",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ean_13" => Some(BarcodeFormat::Ean13),
            "ean_8" => Some(BarcodeFormat::Ean8),
            "upc_a" => Some(BarcodeFormat::UpcA),
            "upc_e" => Some(BarcodeFormat::UpcE),
            "code_39" => Some(BarcodeFormat::Code39),
            "code_128" => Some(BarcodeFormat::Code128),
            "itf" => Some(BarcodeFormat::Itf),
            "qr_code" => Some(BarcodeFormat::QrCode),
            "data_matrix" => Some(BarcodeFormat::DataMatrix),
            _ => None,
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decode candidate produced by either backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedCode {
    pub raw_value: String,
    pub format: Option<BarcodeFormat>,
}

impl DetectedCode {
    pub fn new(raw_value: impl Into<String>, format: Option<BarcodeFormat>) -> Self {
        Self {
            raw_value: raw_value.into(),
            format,
        }
    }
}

/// Decoding strategy selected once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    NativeDetector,
    FallbackDecoder,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NativeDetector => "native-detector",
            Strategy::FallbackDecoder => "fallback-decoder",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a scan session. Transitions are one-directional;
/// `Stopped` is reachable from every other phase and is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Initializing,
    Scanning,
    Detected,
    Errored,
    Stopped,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Detected | SessionPhase::Errored | SessionPhase::Stopped
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_advance_to(&self, next: SessionPhase) -> bool {
        match (self, next) {
            (SessionPhase::Stopped, _) => false,
            (_, SessionPhase::Stopped) => true,
            (SessionPhase::Idle, SessionPhase::Initializing) => true,
            (SessionPhase::Initializing, SessionPhase::Scanning) => true,
            (SessionPhase::Initializing, SessionPhase::Errored) => true,
            (SessionPhase::Scanning, SessionPhase::Detected) => true,
            (SessionPhase::Scanning, SessionPhase::Errored) => true,
            _ => false,
        }
    }
}
