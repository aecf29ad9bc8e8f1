//! Scan session lifecycle management.
//!
//! One `ScannerPipeline` runs at most one scan session at a time:
//! capability probe, strategy selection, camera acquisition, sampling
//! loop, and a teardown path that releases every held resource exactly
//! once on detection, failure, or cancellation.

pub mod bus;
pub mod config;
pub mod scanner;
pub mod session;

pub use bus::EventBus;
pub use config::{ConfigError, PipelineConfig};
pub use scanner::{DetectedHandler, ErrorHandler, ScannerPipeline};
