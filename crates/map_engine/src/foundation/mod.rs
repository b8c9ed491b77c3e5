//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Process-unique identifiers
//! - Math types for local and screen frames
//! - Collections and data structures
//! - Logging utilities

pub mod ids;
pub mod math;
pub mod collections;
pub mod logging;
pub mod sync;
