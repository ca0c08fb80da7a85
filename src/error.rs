//! Error taxonomy for registration, lifecycle and state updates.
//!
//! Checker failures are not represented here: a checker returns a
//! [`BoxError`] that the scheduler logs and drops.

use std::convert::Infallible;
use thiserror::Error;

/// Boxed error returned by checker implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced synchronously to callers of the health check API.
#[derive(Debug, Error)]
pub enum HealthError {
    /// A registration was malformed (empty or duplicate check name).
    #[error("invalid check configuration: {0}")]
    Configuration(String),

    /// A check was registered after the health check was started.
    #[error("cannot add check {name:?}: health check has already started")]
    AlreadyStarted { name: String },

    /// A state update used a status outside OK / WARNING / CRITICAL.
    #[error("invalid status value {0:?}")]
    InvalidStatus(String),

    /// Build metadata could not be parsed.
    #[error("invalid build time {value:?}: {reason}")]
    InvalidBuildTime { value: String, reason: String },
}

impl From<Infallible> for HealthError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Result type for health check operations.
pub type HealthResult<T> = Result<T, HealthError>;
