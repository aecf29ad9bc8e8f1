pub mod simulated;

pub use simulated::{
    AbsentCamera, DeniedCamera, RecordingSink, SimulatedCamera, UnresponsiveCamera,
};
