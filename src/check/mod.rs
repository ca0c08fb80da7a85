//! Checks: a name, a probe function and the state it writes.
//!
//! # Data Flow
//! ```text
//! Ticker tick
//!     → Check::run(cancel)
//!     → Checker::check(cancel, state)
//!         Ok  → checker already wrote the state via update()
//!         Err → state untouched, error returned to the ticker
//!     → CheckState change callback → HealthCheck recompute + subscribers
//! ```
//!
//! # Checker Contract
//! - Write a consistent snapshot with [`CheckState::update`] and return `Ok`, or
//! - return `Err` without writing anything.
//!
//! A failed run must never erase the previously recorded snapshot.

pub mod state;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, HealthError, HealthResult};

pub use state::{ChangeCallback, CheckState, StateSnapshot, Status};

/// User-supplied probe for one dependency.
#[async_trait]
pub trait Checker: Send + Sync + 'static {
    /// Probe the dependency and record the outcome in `state`.
    async fn check(
        &self,
        cancel: CancellationToken,
        state: Arc<CheckState>,
    ) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> Checker for F
where
    F: Fn(CancellationToken, Arc<CheckState>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn check(
        &self,
        cancel: CancellationToken,
        state: Arc<CheckState>,
    ) -> Result<(), BoxError> {
        (self)(cancel, state).await
    }
}

/// A registered dependency check.
pub struct Check {
    state: Arc<CheckState>,
    checker: Arc<dyn Checker>,
    /// Start of the current failure episode (hysteresis clock).
    critical_since: Mutex<Option<DateTime<Utc>>>,
}

impl Check {
    /// Create a check with an empty state.
    pub fn new(name: impl Into<String>, checker: impl Checker) -> HealthResult<Self> {
        Self::with_state(CheckState::new(name), Arc::new(checker))
    }

    pub(crate) fn with_state(state: CheckState, checker: Arc<dyn Checker>) -> HealthResult<Self> {
        if state.name().trim().is_empty() {
            return Err(HealthError::Configuration(
                "check name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            state: Arc::new(state),
            checker,
            critical_since: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn state(&self) -> &Arc<CheckState> {
        &self.state
    }

    /// Invoke the checker once against this check's state.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        self.checker.check(cancel, self.state.clone()).await
    }

    pub(crate) fn set_change_callback(&self, callback: ChangeCallback) -> bool {
        self.state.set_change_callback(callback)
    }

    pub(crate) fn critical_since(&self) -> &Mutex<Option<DateTime<Utc>>> {
        &self.critical_since
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("state", &self.state)
            .field("critical_since", &*self.critical_since.lock())
            .finish()
    }
}

impl Serialize for Check {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.state.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn ok_checker(
        _cancel: CancellationToken,
        state: Arc<CheckState>,
    ) -> Result<(), BoxError> {
        state.update(Status::Ok, "all good", 200)?;
        Ok(())
    }

    async fn failing_checker(
        _cancel: CancellationToken,
        _state: Arc<CheckState>,
    ) -> Result<(), BoxError> {
        Err("dependency unreachable".into())
    }

    #[test]
    fn test_create_new() {
        let check = Check::new("check", ok_checker).unwrap();
        assert_eq!(check.name(), "check");
        assert!(!check.state().has_run());
        assert!(!check.state().has_change_callback());
        assert!(check.critical_since().lock().is_none());

        let other = Check::new("check 2", ok_checker).unwrap();
        assert!(!Arc::ptr_eq(check.state(), other.state()));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Check::new("  ", ok_checker).unwrap_err();
        assert!(matches!(err, HealthError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_run_writes_state() {
        let check = Check::new("check", ok_checker).unwrap();
        check.run(CancellationToken::new()).await.unwrap();
        assert_eq!(check.state().status(), Some(Status::Ok));
        assert_eq!(check.state().message(), "all good");
    }

    #[tokio::test]
    async fn test_failing_run_keeps_previous_snapshot() {
        let check = Check::new("check", failing_checker).unwrap();
        check.state().update(Status::Ok, "success", 200).unwrap();
        let before = check.state().snapshot();

        assert!(check.run(CancellationToken::new()).await.is_err());
        assert_eq!(check.state().snapshot(), before);
    }

    #[tokio::test]
    async fn test_closure_checker_receives_token() {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let flag = saw_cancel.clone();
        let checker = move |cancel: CancellationToken, _state: Arc<CheckState>| {
            let flag = flag.clone();
            async move {
                flag.store(cancel.is_cancelled(), Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        };
        let check = Check::new("closure", checker).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        check.run(token).await.unwrap();
        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_json_matches_state() {
        let check = Check::new("some check", ok_checker).unwrap();
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["name"], "some check");
        assert!(json["last_checked"].is_null());
    }
}
