//! Per-check periodic execution.
//!
//! # Data Flow
//! ```text
//! Ticker loop (one task per check):
//!     sleep(jittered interval) | cancellation | stop
//!     → tick: try to take an in-flight permit
//!         permit → spawn Check::run (permit released on completion)
//!         none   → drop the tick (never queued)
//!
//! Stop / cancellation:
//!     leave the loop → acquire every permit (drain) → task exits
//! ```
//!
//! # Design Decisions
//! - At most [`MAX_IN_FLIGHT`] executions of one check run concurrently
//! - Checker errors are logged and counted, never propagated
//! - `stop()` returns only after every in-flight execution has finished

pub mod jitter;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::check::Check;
use crate::observability::metrics;

pub use jitter::calc_interval_with_jitter;

/// Maximum simultaneous executions of the same check.
pub const MAX_IN_FLIGHT: usize = 5;

/// Drives one check's checker on a jittered cadence.
pub struct Ticker {
    check: Arc<Check>,
    interval: Duration,
    /// Explicit stop signal, separate from the caller's cancellation token.
    closing: CancellationToken,
    stopping: Arc<AtomicBool>,
    in_flight: Arc<Semaphore>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    /// Create a stopped ticker for `check`.
    pub fn new(check: Arc<Check>, interval: Duration) -> Self {
        Self {
            check,
            interval,
            closing: CancellationToken::new(),
            stopping: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the timer loop. Has no effect if already started or stopping.
    pub fn start(&self, cancel: CancellationToken) {
        let mut handle = self.handle.lock();
        if handle.is_some() || self.is_stopping() {
            return;
        }

        tracing::debug!(
            check = %self.check.name(),
            interval = ?self.interval,
            "Ticker starting"
        );

        *handle = Some(tokio::spawn(run_loop(
            self.check.clone(),
            self.interval,
            cancel,
            self.closing.clone(),
            self.stopping.clone(),
            self.in_flight.clone(),
        )));
    }

    /// Stop ticking and wait for every in-flight execution to complete.
    ///
    /// Only the first call waits; later calls return immediately.
    pub async fn stop(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            self.closing.cancel();
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(
                    check = %self.check.name(),
                    error = %e,
                    "Ticker task ended abnormally"
                );
            }
            tracing::debug!(check = %self.check.name(), "Ticker stopped");
        }
    }

    /// Whether the ticker has been stopped or cancelled.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Number of executions currently running.
    pub fn in_flight(&self) -> usize {
        MAX_IN_FLIGHT.saturating_sub(self.in_flight.available_permits())
    }

    pub fn check(&self) -> &Arc<Check> {
        &self.check
    }
}

async fn run_loop(
    check: Arc<Check>,
    interval: Duration,
    cancel: CancellationToken,
    closing: CancellationToken,
    stopping: Arc<AtomicBool>,
    in_flight: Arc<Semaphore>,
) {
    loop {
        let period = calc_interval_with_jitter(interval);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(check = %check.name(), "Ticker received cancellation");
                break;
            }
            _ = closing.cancelled() => break,
            _ = tokio::time::sleep(period) => dispatch(&check, &cancel, &in_flight),
        }
    }

    stopping.store(true, Ordering::SeqCst);

    // Holding every permit means no execution is left running.
    match in_flight.acquire_many(MAX_IN_FLIGHT as u32).await {
        Ok(_drained) => {}
        Err(e) => tracing::error!(check = %check.name(), error = %e, "Failed to drain executions"),
    }
}

fn dispatch(check: &Arc<Check>, cancel: &CancellationToken, in_flight: &Arc<Semaphore>) {
    let permit = match in_flight.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(
                check = %check.name(),
                max_in_flight = MAX_IN_FLIGHT,
                "Previous executions still running, dropping tick"
            );
            metrics::record_tick_dropped(check.name());
            return;
        }
    };

    let check = check.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let _permit = permit;
        run_check(&check, cancel).await;
    });
}

async fn run_check(check: &Check, cancel: CancellationToken) {
    match check.run(cancel).await {
        Ok(()) => metrics::record_check_run(check.name(), true),
        Err(e) => {
            let last_checked = check
                .state()
                .last_checked()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            tracing::warn!(
                check = %check.name(),
                last_checked = %last_checked,
                error = %e,
                "Health check execution failed"
            );
            metrics::record_check_run(check.name(), false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckState, Status};
    use crate::error::BoxError;
    use std::sync::atomic::AtomicUsize;

    fn counting_check(runs: Arc<AtomicUsize>, delay: Duration) -> Arc<Check> {
        Arc::new(
            Check::new("counter", move |_cancel: CancellationToken, state: Arc<CheckState>| {
                let runs = runs.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    state.update(Status::Ok, "ok", 200)?;
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), BoxError>(())
                }
            })
            .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_run_checker() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ticker = Ticker::new(
            counting_check(runs.clone(), Duration::ZERO),
            Duration::from_millis(100),
        );
        ticker.start(CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(350)).await;
        ticker.stop().await;

        let count = runs.load(Ordering::SeqCst);
        assert!((2..=4).contains(&count), "unexpected run count {count}");
        assert!(ticker.check().state().has_run());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_checker_is_capped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ticker = Ticker::new(
            counting_check(runs.clone(), Duration::from_secs(60)),
            Duration::from_millis(100),
        );
        ticker.start(CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticker.in_flight(), MAX_IN_FLIGHT);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        ticker.stop().await;
        assert_eq!(ticker.in_flight(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), MAX_IN_FLIGHT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ticker = Ticker::new(counting_check(runs, Duration::ZERO), Duration::from_millis(100));
        ticker.start(CancellationToken::new());

        ticker.stop().await;
        assert!(ticker.is_stopping());
        ticker.stop().await;
        assert!(ticker.is_stopping());

        // A stopped ticker cannot be restarted.
        ticker.start(CancellationToken::new());
        assert!(ticker.handle.lock().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_ticker() {
        let runs = Arc::new(AtomicUsize::new(0));
        let ticker = Ticker::new(
            counting_check(runs.clone(), Duration::ZERO),
            Duration::from_millis(100),
        );
        let cancel = CancellationToken::new();
        ticker.start(cancel.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!ticker.is_stopping());

        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(ticker.is_stopping());

        let after_cancel = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_cancel);
        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_checker_is_not_fatal() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let check = Arc::new(
            Check::new("failing", move |_cancel: CancellationToken, _state: Arc<CheckState>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), BoxError>("boom".into())
                }
            })
            .unwrap(),
        );
        let ticker = Ticker::new(check, Duration::from_millis(100));
        ticker.start(CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(450)).await;
        ticker.stop().await;

        assert!(attempts.load(Ordering::SeqCst) >= 3);
        assert!(!ticker.check().state().has_run());
    }
}
