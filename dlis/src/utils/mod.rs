//! Utility functions and supporting infrastructure.
//!
//! Provides chunked input buffering, typed arenas and error handling.

pub mod arena;
pub mod byte_source;
pub mod errors;

#[cfg(test)]
pub mod testing;
