//! Camera acquisition: driver trait, live stream handle, video sink.

pub mod drivers;
pub mod traits;

pub use traits::{
    CameraConstraints, CameraDriver, CameraStream, CaptureError, Facing, Frame, VideoSink,
};
