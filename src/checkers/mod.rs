//! Built-in checkers.

pub mod http;

use thiserror::Error;

pub use self::http::HttpChecker;

/// Failures of built-in checkers that leave check state untouched.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("check cancelled before completion")]
    Cancelled,

    #[error("failed to build request: {0}")]
    Request(String),

    #[error("invalid check url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
