//! Health aggregation.
//!
//! # Data Flow
//! ```text
//! Registration (before start):
//!     add_check(name, checker)
//!     → Check + change callback (weak back-reference)
//!     → Ticker per check
//!
//! Recompute triggers (status.rs):
//!     report() / status()            on demand
//!     CheckState::update → callback  push, also notifies subscribers
//!     startup poller                 every ~interval/10 until all checks ran
//!     → cached status + uptime
//!
//! stop():
//!     halt poller → stop every ticker concurrently → join pending deliveries
//! ```
//!
//! # Design Decisions
//! - Registration is closed once started
//! - Check names are unique within one aggregator
//! - The cached status has its own lock, never held while locking a check

pub mod status;
pub mod version;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::check::{Check, Checker, CheckState, StateSnapshot, Status};
use crate::error::{HealthError, HealthResult};
use crate::observability::metrics;
use crate::scheduler::{calc_interval_with_jitter, Ticker};
use crate::subscription::{NotifyHandle, Subscriber, SubscriptionRegistry};

pub use version::VersionInfo;

/// Fraction of the tick interval between startup polls.
const STARTUP_POLL_DIVISOR: u32 = 10;

/// Serializable snapshot of the whole health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: Status,
    pub version: VersionInfo,
    /// Milliseconds since `start()`; zero before it.
    pub uptime: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub checks: Vec<StateSnapshot>,
}

#[derive(Default)]
struct Registry {
    checks: Vec<Arc<Check>>,
    tickers: Vec<Arc<Ticker>>,
    started: bool,
    start_time: Option<DateTime<Utc>>,
    started_at: Option<Instant>,
    poller: Option<JoinHandle<()>>,
}

impl Registry {
    fn uptime(&self) -> Duration {
        self.started_at.map_or(Duration::ZERO, |at| at.elapsed())
    }
}

struct CachedStatus {
    status: Status,
    uptime: Duration,
}

struct Inner {
    version: VersionInfo,
    interval: Duration,
    critical_error_timeout: Duration,
    registry: Mutex<Registry>,
    cached: Mutex<CachedStatus>,
    subscriptions: SubscriptionRegistry,
    /// Change-triggered deliveries not yet known to be finished.
    pending_deliveries: Mutex<Vec<NotifyHandle>>,
    poller_stop: CancellationToken,
}

/// Aggregator over a set of dependency checks.
///
/// Cloning yields another handle to the same aggregator.
#[derive(Clone)]
pub struct HealthCheck {
    inner: Arc<Inner>,
}

impl HealthCheck {
    /// Create an aggregator with no checks.
    ///
    /// `critical_error_timeout` is the grace period a failing check spends
    /// reported as WARNING; `interval` is the nominal tick period.
    pub fn new(version: VersionInfo, critical_error_timeout: Duration, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                version,
                interval,
                critical_error_timeout,
                registry: Mutex::new(Registry::default()),
                cached: Mutex::new(CachedStatus {
                    status: Status::Warning,
                    uptime: Duration::ZERO,
                }),
                subscriptions: SubscriptionRegistry::new(),
                pending_deliveries: Mutex::new(Vec::new()),
                poller_stop: CancellationToken::new(),
            }),
        }
    }

    /// Register a check. Fails once the aggregator has started.
    pub fn add_check(&self, name: impl Into<String>, checker: impl Checker) -> HealthResult<()> {
        self.add_and_get_check(name, checker).map(|_| ())
    }

    /// Register a check and return a handle to it.
    pub fn add_and_get_check(
        &self,
        name: impl Into<String>,
        checker: impl Checker,
    ) -> HealthResult<Arc<Check>> {
        let name = name.into();
        let mut registry = self.inner.registry.lock();

        if registry.started {
            tracing::warn!(check = %name, "Rejecting check registered after start");
            return Err(HealthError::AlreadyStarted { name });
        }
        if registry.checks.iter().any(|check| check.name() == name) {
            return Err(HealthError::Configuration(format!(
                "duplicate check name {name:?}"
            )));
        }

        let check = Arc::new(Check::with_state(CheckState::new(name), Arc::new(checker))?);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        check.set_change_callback(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_check_changed();
            }
        }));

        registry.tickers.push(Arc::new(Ticker::new(check.clone(), self.inner.interval)));
        registry.checks.push(check.clone());

        tracing::debug!(check = %check.name(), "Check registered");
        Ok(check)
    }

    /// Start every ticker and the startup poller.
    ///
    /// Tickers stop on their own when `cancel` fires; `stop()` is still
    /// needed to wait for in-flight executions.
    pub fn start(&self, cancel: CancellationToken) {
        let mut registry = self.inner.registry.lock();
        if registry.started {
            return;
        }
        registry.started = true;
        registry.start_time = Some(Utc::now());
        registry.started_at = Some(Instant::now());

        for ticker in &registry.tickers {
            ticker.start(cancel.clone());
        }

        registry.poller = Some(tokio::spawn(startup_poller(
            Arc::downgrade(&self.inner),
            self.inner.interval / STARTUP_POLL_DIVISOR,
            cancel,
            self.inner.poller_stop.clone(),
        )));

        tracing::info!(
            checks = registry.checks.len(),
            interval = ?self.inner.interval,
            "Health check started"
        );
    }

    /// Stop all tickers and wait until every in-flight execution and every
    /// subscriber delivery it triggered is done.
    pub async fn stop(&self) {
        let (tickers, poller) = {
            let mut registry = self.inner.registry.lock();
            (registry.tickers.clone(), registry.poller.take())
        };

        self.inner.poller_stop.cancel();
        join_all(tickers.iter().map(|ticker| ticker.stop())).await;

        if let Some(poller) = poller {
            if let Err(e) = poller.await {
                tracing::error!(error = %e, "Startup poller ended abnormally");
            }
        }

        let pending = std::mem::take(&mut *self.inner.pending_deliveries.lock());
        join_all(pending.into_iter().map(NotifyHandle::wait)).await;
        tracing::info!("Health check stopped");
    }

    /// Recompute and return the overall status.
    pub fn status(&self) -> Status {
        self.inner.refresh()
    }

    /// Last computed status without recomputing.
    pub fn cached_status(&self) -> Status {
        self.inner.cached.lock().status
    }

    /// Recompute the status and return a full snapshot.
    pub fn report(&self) -> HealthReport {
        let status = self.inner.refresh();
        let uptime = self.inner.cached.lock().uptime;
        HealthReport {
            status,
            version: self.inner.version.clone(),
            uptime: u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
            start_time: self.start_time(),
            checks: self.checks().iter().map(|check| check.state().snapshot()).collect(),
        }
    }

    /// Registered checks in registration order.
    pub fn checks(&self) -> Vec<Arc<Check>> {
        self.inner.registry.lock().checks.clone()
    }

    pub fn tickers(&self) -> Vec<Arc<Ticker>> {
        self.inner.registry.lock().tickers.clone()
    }

    pub fn version(&self) -> &VersionInfo {
        &self.inner.version
    }

    /// Time since `start()`; zero before it.
    pub fn uptime(&self) -> Duration {
        self.inner.registry.lock().uptime()
    }

    /// Wall-clock time of `start()`, if it has been called.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.inner.registry.lock().start_time
    }

    pub fn is_started(&self) -> bool {
        self.inner.registry.lock().started
    }

    pub fn critical_error_timeout(&self) -> Duration {
        self.inner.critical_error_timeout
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Add `checks` to the subscriber's interest set.
    pub fn subscribe<S: Subscriber>(&self, subscriber: &Arc<S>, checks: &[Arc<Check>]) {
        self.inner.subscriptions.subscribe(subscriber, checks);
    }

    /// Subscribe to every check registered so far.
    pub fn subscribe_all<S: Subscriber>(&self, subscriber: &Arc<S>) {
        let checks = self.checks();
        self.inner.subscriptions.subscribe_all(subscriber, &checks);
    }

    pub fn unsubscribe<S: Subscriber>(&self, subscriber: &Arc<S>, checks: &[Arc<Check>]) {
        self.inner.subscriptions.unsubscribe(subscriber, checks);
    }

    pub fn unsubscribe_all<S: Subscriber>(&self, subscriber: &Arc<S>) {
        self.inner.subscriptions.unsubscribe_all(subscriber);
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.inner.subscriptions
    }

    /// Deliver the current combined status to every subscriber.
    pub fn notify_subscribers(&self) -> NotifyHandle {
        self.inner.subscriptions.notify(self.inner.critical_error_timeout)
    }
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("version", &self.inner.version)
            .field("interval", &self.inner.interval)
            .field("critical_error_timeout", &self.inner.critical_error_timeout)
            .field("status", &self.cached_status())
            .field("checks", &self.checks().len())
            .finish()
    }
}

impl Inner {
    fn on_check_changed(&self) {
        let deliveries = self.subscriptions.notify(self.critical_error_timeout);
        {
            let mut pending = self.pending_deliveries.lock();
            pending.retain(|handle| !handle.is_finished());
            if !deliveries.is_empty() {
                pending.push(deliveries);
            }
        }
        self.refresh();
    }

    fn is_starting_up(&self) -> bool {
        let checks = self.registry.lock().checks.clone();
        status::is_starting_up(&checks)
    }

    fn refresh(&self) -> Status {
        let (checks, uptime) = {
            let registry = self.registry.lock();
            (registry.checks.clone(), registry.uptime())
        };

        // Aggregate under the cache lock so concurrent refreshes store in order.
        let (previous, status) = {
            let mut cached = self.cached.lock();
            let status = status::aggregate(&checks, self.critical_error_timeout, Utc::now());
            let previous = std::mem::replace(&mut cached.status, status);
            cached.uptime = uptime;
            (previous, status)
        };

        if previous != status {
            tracing::info!(from = %previous, to = %status, "Health status changed");
        }
        metrics::record_status(status);
        status
    }
}

async fn startup_poller(
    inner: Weak<Inner>,
    period: Duration,
    cancel: CancellationToken,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(calc_interval_with_jitter(period)) => {}
        }

        let Some(inner) = inner.upgrade() else { break };
        inner.refresh();
        if !inner.is_starting_up() {
            tracing::debug!("All checks have reported, startup poller exiting");
            break;
        }
    }
}
