//! Push notification of combined check status.
//!
//! # Data Flow
//! ```text
//! CheckState::update → change callback
//!     → SubscriptionRegistry::notify
//!         snapshot (subscriber, checks) pairs, release map guards
//!         → per subscriber: worst-of status over its checks
//!         → blocking task per subscriber: on_health_update(status)
//!     → NotifyHandle (await to join every delivery)
//! ```
//!
//! # Design Decisions
//! - Subscribers are held weakly; dropped subscribers are pruned on notify
//! - Interest sets are keyed by check name (names are unique)
//! - No check lock is held while the registry map is locked

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::check::{Check, Status};
use crate::health::status::aggregate;
use crate::observability::metrics;

/// Observer of combined health status.
pub trait Subscriber: Send + Sync + 'static {
    /// Receive the worst-of status of the subscribed checks.
    fn on_health_update(&self, status: Status);
}

type SubscriberKey = usize;

fn key_of<S>(subscriber: &Arc<S>) -> SubscriberKey {
    Arc::as_ptr(subscriber) as *const () as usize
}

struct Subscription {
    subscriber: Weak<dyn Subscriber>,
    checks: BTreeMap<String, Arc<Check>>,
}

impl Subscription {
    fn new(subscriber: Weak<dyn Subscriber>) -> Self {
        Self {
            subscriber,
            checks: BTreeMap::new(),
        }
    }
}

/// Mapping from subscriber to the checks it watches.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<SubscriberKey, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `checks` to the subscriber's interest set, creating it if needed.
    pub fn subscribe<S: Subscriber>(&self, subscriber: &Arc<S>, checks: &[Arc<Check>]) {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        let weak: Weak<dyn Subscriber> = weak;

        let mut entry = self
            .subscriptions
            .entry(key_of(subscriber))
            .or_insert_with(|| Subscription::new(weak.clone()));

        // Address reused by a new subscriber after the old one was dropped.
        if entry.subscriber.strong_count() == 0 {
            *entry = Subscription::new(weak);
        }

        for check in checks {
            entry.checks.insert(check.name().to_string(), check.clone());
        }
    }

    /// Replace the subscriber's interest set with exactly `checks`.
    pub fn subscribe_all<S: Subscriber>(&self, subscriber: &Arc<S>, checks: &[Arc<Check>]) {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        let mut subscription = Subscription::new(weak);
        for check in checks {
            subscription.checks.insert(check.name().to_string(), check.clone());
        }
        self.subscriptions.insert(key_of(subscriber), subscription);
    }

    /// Remove `checks` from the interest set; drop the entry once empty.
    pub fn unsubscribe<S: Subscriber>(&self, subscriber: &Arc<S>, checks: &[Arc<Check>]) {
        let key = key_of(subscriber);
        if let Some(mut entry) = self.subscriptions.get_mut(&key) {
            for check in checks {
                entry.checks.remove(check.name());
            }
        }
        self.subscriptions.remove_if(&key, |_, subscription| subscription.checks.is_empty());
    }

    /// Stop all notifications to the subscriber.
    pub fn unsubscribe_all<S: Subscriber>(&self, subscriber: &Arc<S>) {
        self.subscriptions.remove(&key_of(subscriber));
    }

    /// Names of the checks the subscriber watches, sorted.
    pub fn subscribed_checks<S: Subscriber>(&self, subscriber: &Arc<S>) -> Vec<String> {
        self.subscriptions
            .get(&key_of(subscriber))
            .map(|entry| entry.checks.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        self.subscriptions.contains_key(&key_of(subscriber))
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Compute and deliver each subscriber's combined status.
    pub fn notify(&self, critical_error_timeout: Duration) -> NotifyHandle {
        let mut targets = Vec::new();
        let mut dropped = Vec::new();
        for entry in self.subscriptions.iter() {
            match entry.subscriber.upgrade() {
                Some(subscriber) => {
                    let checks: Vec<_> = entry.checks.values().cloned().collect();
                    targets.push((subscriber, checks));
                }
                None => dropped.push(*entry.key()),
            }
        }
        for key in dropped {
            self.subscriptions
                .remove_if(&key, |_, subscription| subscription.subscriber.strong_count() == 0);
        }

        let now = Utc::now();
        let runtime = Handle::try_current().ok();
        let mut deliveries = Vec::with_capacity(targets.len());

        for (subscriber, checks) in targets {
            let status = aggregate(&checks, critical_error_timeout, now);
            metrics::record_notification();
            match &runtime {
                Some(runtime) => {
                    let delivery = move || subscriber.on_health_update(status);
                    deliveries.push(runtime.spawn_blocking(delivery));
                }
                None => subscriber.on_health_update(status),
            }
        }

        NotifyHandle { deliveries }
    }
}

/// Join handle over the deliveries of one notification event.
#[must_use = "dropping the handle detaches the deliveries"]
pub struct NotifyHandle {
    deliveries: Vec<JoinHandle<()>>,
}

impl NotifyHandle {
    /// Number of deliveries still attached to this handle.
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// True once every delivery has returned.
    pub fn is_finished(&self) -> bool {
        self.deliveries.iter().all(JoinHandle::is_finished)
    }

    /// Wait until every subscriber has received this event.
    pub async fn wait(self) {
        for result in join_all(self.deliveries).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Subscriber panicked while handling health update");
            }
        }
    }
}
