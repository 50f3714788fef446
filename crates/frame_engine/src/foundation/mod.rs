//! Foundation module - Core utilities and types
//!
//! - Math types and the object transform
//! - Frame timing
//! - Logging bootstrap

pub mod logging;
pub mod math;
pub mod time;
