//! Lumen math - vector, ray and interval types.
//!
//! Vector arithmetic comes from glam; this crate adds the small value
//! types the path tracer passes around.

// Re-export glam for convenience
pub use glam::*;

mod interval;
mod ray;

pub use interval::Interval;
pub use ray::Ray;
