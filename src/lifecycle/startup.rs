//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Checks are registered in config order, before the aggregator starts

use thiserror::Error;

use crate::checkers::{CheckError, HttpChecker};
use crate::config::ServiceConfig;
use crate::error::HealthError;
use crate::health::{HealthCheck, VersionInfo};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("check {name:?}: {source}")]
    Checker { name: String, source: CheckError },

    #[error(transparent)]
    Registration(#[from] HealthError),
}

/// Build an unstarted aggregator with one HTTP check per configured entry.
pub fn build_health_check(
    config: &ServiceConfig,
    version: VersionInfo,
) -> Result<HealthCheck, StartupError> {
    let health = HealthCheck::new(
        version,
        config.health.critical_error_timeout(),
        config.health.interval(),
    );

    for check in &config.checks {
        let checker = HttpChecker::new(&check.url, check.timeout()).map_err(|source| {
            StartupError::Checker {
                name: check.name.clone(),
                source,
            }
        })?;
        health.add_check(check.name.clone(), checker)?;
        tracing::info!(check = %check.name, url = %check.url, "HTTP check configured");
    }

    Ok(health)
}
