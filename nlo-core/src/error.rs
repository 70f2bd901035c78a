//! Boundary error types.
//!
//! Only two failure tiers raise: argument validation before any solver state
//! is touched, and allocation-class failures that leave no partial handle.
//! Everything the solver itself reports travels as a [`crate::Status`] value.

use thiserror::Error;

/// Errors raised at the host boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Argument validation failed (bad algorithm index, negative dimension,
    /// wrong shape). Raised before touching solver state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation-class failure on create/copy; fatal, no partial handle
    /// remains.
    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

/// Result type for boundary operations.
pub type Result<T> = std::result::Result<T, Error>;
