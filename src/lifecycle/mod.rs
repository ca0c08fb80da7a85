//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build HealthCheck → Start tickers → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → cancel token → server drains → HealthCheck::stop() → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then checks, then listeners
//! - Shutdown waits for in-flight checks before exiting

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{build_health_check, StartupError};
