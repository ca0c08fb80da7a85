//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router serving `/health`
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve on a bound listener until the shutdown token fires

use axum::{routing::get, Router};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::health::HealthCheck;
use crate::http::handler::health_handler;
use crate::http::request::{request_id_header, UuidRequestId};

/// Upper bound on serving one health request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server exposing the health report.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(health: HealthCheck) -> Self {
        Self {
            router: Self::build_router(health),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(health: HealthCheck) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .with_state(health)
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header(), UuidRequestId))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` is cancelled.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("HTTP server shutting down");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
