//! Error types for `TierCache`.
//!
//! Cache misses are never errors: lookups return `Option`. The variants below
//! cover the few places where a caller's input or the manager's lifecycle can
//! actually be wrong.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for `TierCache` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `TierCache` operations.
///
/// Error codes follow the pattern `TIER-XXX` for easy grepping in logs.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (TIER-001).
    #[error("[TIER-001] Configuration error: {0}")]
    Config(String),

    /// A `clear()` pattern failed to compile (TIER-002).
    #[error("[TIER-002] Invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The background tasks are not running (TIER-003).
    ///
    /// Returned by `warm_cache` before `initialize()` or after `shutdown()`.
    #[error("[TIER-003] Cache manager is not running: {0}")]
    NotRunning(String),

    /// No async runtime available to spawn background tasks (TIER-004).
    #[error("[TIER-004] Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Returns the error code (e.g., "TIER-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "TIER-001",
            Self::InvalidPattern(_) => "TIER-002",
            Self::NotRunning(_) => "TIER-003",
            Self::Runtime(_) => "TIER-004",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// A missing runtime is not something the caller can retry its way out of.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Runtime(_))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
