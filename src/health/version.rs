//! Build and version metadata reported alongside health.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HealthError, HealthResult};

/// Language reported in [`VersionInfo`].
pub const LANGUAGE: &str = "rust";

/// Version information of the service being monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub build_time: DateTime<Utc>,
    pub git_commit: String,
    pub language: String,
    pub language_version: String,
    pub version: String,
}

impl VersionInfo {
    /// Build version info, parsing `build_time` as Unix seconds.
    pub fn new(
        build_time: &str,
        git_commit: impl Into<String>,
        version: impl Into<String>,
    ) -> HealthResult<Self> {
        let secs: i64 = build_time.trim().parse().map_err(|e: std::num::ParseIntError| {
            HealthError::InvalidBuildTime {
                value: build_time.to_string(),
                reason: e.to_string(),
            }
        })?;
        let build_time = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            HealthError::InvalidBuildTime {
                value: build_time.to_string(),
                reason: "timestamp out of range".to_string(),
            }
        })?;

        Ok(Self::with_build_time(build_time, git_commit, version))
    }

    /// Version info whose build time is the Unix epoch.
    pub fn with_epoch_build_time(
        git_commit: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::with_build_time(DateTime::<Utc>::UNIX_EPOCH, git_commit, version)
    }

    fn with_build_time(
        build_time: DateTime<Utc>,
        git_commit: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            build_time,
            git_commit: git_commit.into(),
            language: LANGUAGE.to_string(),
            language_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            version: version.into(),
        }
    }
}
