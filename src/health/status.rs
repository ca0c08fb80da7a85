//! Status resolution with critical-error hysteresis.
//!
//! # Per-check contribution
//! ```text
//! never run          → WARNING (and the whole set is WARNING)
//! OK                 → OK
//! WARNING            → WARNING
//! CRITICAL / unset   → hysteresis:
//!     no episode open, or success since it opened → open episode now, WARNING
//!     episode open for >= critical_error_timeout  → CRITICAL
//!     otherwise                                   → WARNING
//! ```
//!
//! The episode clock lives on each [`Check`], so one dependency recovering
//! never resets the grace period of another.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::check::{Check, Status};

/// Worst contribution across `checks`, evaluated at `now`.
///
/// An empty set is OK. Any check that has never run forces WARNING.
pub(crate) fn aggregate<'a, I>(
    checks: I,
    critical_error_timeout: Duration,
    now: DateTime<Utc>,
) -> Status
where
    I: IntoIterator<Item = &'a Arc<Check>>,
{
    let checks: Vec<&Arc<Check>> = checks.into_iter().collect();

    if checks.iter().any(|check| !check.state().has_run()) {
        tracing::debug!("A dependency is still starting up");
        return Status::Warning;
    }

    let mut status = Status::Ok;
    for check in checks {
        match resolve_check(check, critical_error_timeout, now) {
            Status::Critical => return Status::Critical,
            Status::Warning => status = Status::Warning,
            Status::Ok => {}
        }
    }
    status
}

/// Whether any check in the set has never completed a run.
pub(crate) fn is_starting_up<'a, I>(checks: I) -> bool
where
    I: IntoIterator<Item = &'a Arc<Check>>,
{
    checks.into_iter().any(|check| !check.state().has_run())
}

/// Contribution of a single check that has already run.
pub(crate) fn resolve_check(
    check: &Check,
    critical_error_timeout: Duration,
    now: DateTime<Utc>,
) -> Status {
    let snapshot = check.state().snapshot();
    match snapshot.status {
        Some(Status::Ok) => Status::Ok,
        Some(Status::Warning) => Status::Warning,
        Some(Status::Critical) | None => {
            escalate(check, snapshot.last_success, critical_error_timeout, now)
        }
    }
}

fn escalate(
    check: &Check,
    last_success: Option<DateTime<Utc>>,
    critical_error_timeout: Duration,
    now: DateTime<Utc>,
) -> Status {
    let mut critical_since = check.critical_since().lock();

    match *critical_since {
        Some(since) if last_success.map_or(true, |success| success <= since) => {
            let deadline = chrono::Duration::from_std(critical_error_timeout)
                .ok()
                .and_then(|timeout| since.checked_add_signed(timeout));
            match deadline {
                Some(deadline) if now >= deadline => Status::Critical,
                _ => Status::Warning,
            }
        }
        _ => {
            tracing::debug!(check = %check.name(), "Critical failure episode started");
            *critical_since = Some(now);
            Status::Warning
        }
    }
}
