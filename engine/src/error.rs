//! Error types for the Mirror engine.
//!
//! Drain paths are total over their decision tables and never fail; the
//! error type only covers the boundary with the gateway.

use thiserror::Error;

/// All possible errors from the Mirror engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The "get current state" call soft-failed, so no baseline cursor could
    /// be adopted. The caller retries, typically on the next reconnect.
    #[error("current state unavailable from gateway")]
    StateUnavailable,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
