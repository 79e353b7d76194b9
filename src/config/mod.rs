//! Configuration helpers shared across the crate.
//!
//! The cache's own tuning knobs live in [`crate::cache::CacheConfig`]; this
//! module provides the generic pieces: human-readable size parsing for memory
//! budgets and formatting for log output.

mod size;

pub use size::{format_size, parse_size, SizeParseError};
