//! HTTP surface over the aggregator.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → request.rs (x-request-id assigned or propagated)
//!     → handler.rs (HealthCheck::report, status code mapping)
//!     → JSON HealthReport
//! ```

pub mod handler;
pub mod request;
pub mod server;

pub use handler::{health_handler, status_code_for};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
