//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("health.interval_secs must be greater than zero")]
    ZeroInterval,

    #[error("health.critical_error_timeout_secs must be greater than zero")]
    ZeroCriticalTimeout,

    #[error("{field} {value:?} is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("checks[{index}] has an empty name")]
    EmptyCheckName { index: usize },

    #[error("check name {0:?} is used more than once")]
    DuplicateCheckName(String),

    #[error("check {name:?} has invalid url {url:?}: {reason}")]
    InvalidCheckUrl { name: String, url: String, reason: String },

    #[error("check {0:?} must have a timeout greater than zero")]
    ZeroCheckTimeout(String),
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval);
    }
    if config.health.critical_error_timeout_secs == 0 {
        errors.push(ValidationError::ZeroCriticalTimeout);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let mut seen = HashSet::new();
    for (index, check) in config.checks.iter().enumerate() {
        if check.name.trim().is_empty() {
            errors.push(ValidationError::EmptyCheckName { index });
        } else if !seen.insert(check.name.as_str()) {
            errors.push(ValidationError::DuplicateCheckName(check.name.clone()));
        }

        match Url::parse(&check.url) {
            Ok(url) if url.scheme() == "http" => {}
            Ok(url) => errors.push(ValidationError::InvalidCheckUrl {
                name: check.name.clone(),
                url: check.url.clone(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidCheckUrl {
                name: check.name.clone(),
                url: check.url.clone(),
                reason: e.to_string(),
            }),
        }

        if check.timeout_secs == 0 {
            errors.push(ValidationError::ZeroCheckTimeout(check.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
