//! # Kaiju Core
//!
//! Shared utilities for the Kaiju render pipeline: math helpers used by the
//! graphics crate and small allocation-reuse containers for frame-based data.

pub mod math;
pub mod pool;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
