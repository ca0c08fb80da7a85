//! Dependency health monitoring.
//!
//! Register named checks, run them on jittered timers and combine their
//! results into one OK / WARNING / CRITICAL status with a grace period
//! for failing dependencies.

pub mod check;
pub mod checkers;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod scheduler;
pub mod subscription;

pub use check::{Check, CheckState, Checker, StateSnapshot, Status};
pub use config::ServiceConfig;
pub use error::{BoxError, HealthError, HealthResult};
pub use health::{HealthCheck, HealthReport, VersionInfo};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use subscription::{NotifyHandle, Subscriber};
