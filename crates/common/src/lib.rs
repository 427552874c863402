//! Shared value types for the object counter.

pub mod types;

pub use types::{InvalidObjectClass, ObjectClass, ObjectCount};
