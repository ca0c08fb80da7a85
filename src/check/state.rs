//! Last-known result of a single check.
//!
//! # Update Contract
//! ```text
//! update(status, message, code)
//!     → reject unknown status (no mutation)
//!     → write lock: status/message/code, last_checked = now,
//!       last_success or last_failure = now
//!     → release lock
//!     → change callback (if wired)
//! ```
//!
//! A state that was never written has no timestamps at all; that is the
//! "never run" condition and is distinct from every known status.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use crate::error::{HealthError, HealthResult};

/// Health status of a check or of the whole service.
///
/// Variants are ordered by severity so that `max` yields the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Warning,
    Critical,
}

impl Status {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
        }
    }

    /// Numeric severity (0 = OK, 2 = CRITICAL).
    pub fn severity(&self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Status::Ok),
            "WARNING" => Ok(Status::Warning),
            "CRITICAL" => Ok(Status::Critical),
            other => Err(HealthError::InvalidStatus(other.to_string())),
        }
    }
}

impl TryFrom<&str> for Status {
    type Error = HealthError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Status {
    type Error = HealthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Hook run after every successful update, outside the state lock.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Point-in-time copy of a [`CheckState`], used for reads and JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub name: String,
    pub status: Option<Status>,
    pub status_code: u16,
    pub message: String,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct StateData {
    status: Option<Status>,
    status_code: u16,
    message: String,
    last_checked: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

/// Lock-guarded snapshot of one dependency's last known health.
pub struct CheckState {
    name: String,
    data: RwLock<StateData>,
    on_change: OnceLock<ChangeCallback>,
}

impl CheckState {
    /// Create an empty ("never run") state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(StateData::default()),
            on_change: OnceLock::new(),
        }
    }

    /// Rebuild a state from a snapshot (e.g. one read back from JSON).
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            name: snapshot.name,
            data: RwLock::new(StateData {
                status: snapshot.status,
                status_code: snapshot.status_code,
                message: snapshot.message,
                last_checked: snapshot.last_checked,
                last_success: snapshot.last_success,
                last_failure: snapshot.last_failure,
            }),
            on_change: OnceLock::new(),
        }
    }

    /// Record a new result.
    ///
    /// Accepts a [`Status`] or its wire string. An unknown status string
    /// fails with [`HealthError::InvalidStatus`] and leaves the state as it was.
    pub fn update<S>(
        &self,
        status: S,
        message: impl Into<String>,
        status_code: u16,
    ) -> HealthResult<()>
    where
        S: TryInto<Status>,
        HealthError: From<S::Error>,
    {
        let status = status.try_into()?;
        let now = Utc::now();

        {
            let mut data = self.data.write();
            data.status = Some(status);
            data.message = message.into();
            data.status_code = status_code;
            data.last_checked = Some(now);
            if status == Status::Ok {
                data.last_success = Some(now);
            } else {
                data.last_failure = Some(now);
            }
        }

        if let Some(callback) = self.on_change.get() {
            callback();
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Option<Status> {
        self.data.read().status
    }

    pub fn status_code(&self) -> u16 {
        self.data.read().status_code
    }

    pub fn message(&self) -> String {
        self.data.read().message.clone()
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.data.read().last_checked
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.data.read().last_success
    }

    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.data.read().last_failure
    }

    /// Whether any result has ever been recorded.
    pub fn has_run(&self) -> bool {
        self.data.read().last_checked.is_some()
    }

    /// Consistent copy of every field, taken under one read lock.
    pub fn snapshot(&self) -> StateSnapshot {
        let data = self.data.read();
        StateSnapshot {
            name: self.name.clone(),
            status: data.status,
            status_code: data.status_code,
            message: data.message.clone(),
            last_checked: data.last_checked,
            last_success: data.last_success,
            last_failure: data.last_failure,
        }
    }

    /// Wire the change hook. Only the first call has an effect.
    pub(crate) fn set_change_callback(&self, callback: ChangeCallback) -> bool {
        self.on_change.set(callback).is_ok()
    }

    pub(crate) fn has_change_callback(&self) -> bool {
        self.on_change.get().is_some()
    }
}

impl fmt::Debug for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("CheckState")
            .field("name", &self.name)
            .field("status", &data.status)
            .field("status_code", &data.status_code)
            .field("message", &data.message)
            .field("last_checked", &data.last_checked)
            .finish()
    }
}

impl Serialize for CheckState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}
