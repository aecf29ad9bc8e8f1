//! Core domain types for the caja scan pipeline.

pub mod error;
pub mod events;
pub mod time;
pub mod types;

pub use error::*;
pub use types::*;
