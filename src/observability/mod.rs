//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler, aggregator, subscriptions produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
