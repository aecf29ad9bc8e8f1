//! Decoder backends for the scan pipeline.
//!
//! Two strategies exist: a native detector driven frame-by-frame by the
//! pipeline's sampling loop, and a fallback decoder that runs its own
//! continuous loop bound to the live video sink. The strategy is chosen
//! once per session by probing the host capability.

pub mod backend;
pub mod simulated;
pub mod traits;

pub use backend::DecoderBackend;
pub use traits::{
    ContinuousDecoder, DecodeControls, DecodeError, DetectorProbe, FrameDetector, ResultHandler,
};
