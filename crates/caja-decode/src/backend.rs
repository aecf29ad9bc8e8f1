use crate::traits::{ContinuousDecoder, DecodeControls, FrameDetector};
use caja_core::Strategy;
use std::sync::Arc;

/// The decoder handle owned by one session: whichever backend the
/// strategy selection produced, with a single shared release path.
pub enum DecoderBackend {
    Native(Arc<dyn FrameDetector>),
    Fallback {
        decoder: Arc<dyn ContinuousDecoder>,
        controls: Option<Box<dyn DecodeControls>>,
    },
}

impl DecoderBackend {
    pub fn strategy(&self) -> Strategy {
        match self {
            DecoderBackend::Native(_) => Strategy::NativeDetector,
            DecoderBackend::Fallback { .. } => Strategy::FallbackDecoder,
        }
    }

    /// Releases backend resources. For the native detector dropping the
    /// handle is the release; the fallback decoder additionally needs
    /// its control handle stopped and its decode state reset.
    pub fn release(&mut self) {
        match self {
            DecoderBackend::Native(_) => {}
            DecoderBackend::Fallback { decoder, controls } => {
                if let Some(controls) = controls.take() {
                    controls.stop();
                }
                decoder.reset();
            }
        }
    }
}
