//! HTTP dependency checker.
//!
//! # Outcome mapping
//! ```text
//! 2xx                       → OK
//! 429                       → WARNING
//! any other status          → CRITICAL (code recorded)
//! connect error / timeout   → CRITICAL (code 0)
//! cancelled                 → Err(Cancelled), state untouched
//! ```

use async_trait::async_trait;
use axum::body::Body;
use hyper::{header, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::CheckError;
use crate::check::{Checker, CheckState, Status};
use crate::error::BoxError;

const USER_AGENT: &str = concat!("healthcheck/", env!("CARGO_PKG_VERSION"));

/// Probes a dependency with `GET url`.
#[derive(Clone)]
pub struct HttpChecker {
    uri: Uri,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
}

impl HttpChecker {
    /// Create a checker for a plain `http://` URL.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CheckError> {
        let invalid = |reason: String| CheckError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        if parsed.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme {:?}", parsed.scheme())));
        }
        let uri: Uri = parsed
            .as_str()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| invalid(e.to_string()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self { uri, timeout, client })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, code: StatusCode) -> (Status, String) {
        let status = if code.is_success() {
            Status::Ok
        } else if code == StatusCode::TOO_MANY_REQUESTS {
            Status::Warning
        } else {
            Status::Critical
        };
        (status, format!("{} returned {}", self.uri, code))
    }
}

#[async_trait]
impl Checker for HttpChecker {
    async fn check(
        &self,
        cancel: CancellationToken,
        state: Arc<CheckState>,
    ) -> Result<(), BoxError> {
        let request = Request::get(self.uri.clone())
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
            .map_err(|e| CheckError::Request(e.to_string()))?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CheckError::Cancelled.into()),
            outcome = tokio::time::timeout(self.timeout, self.client.request(request)) => outcome,
        };

        let (status, message, code) = match outcome {
            Ok(Ok(response)) => {
                let code = response.status();
                let (status, message) = self.classify(code);
                (status, message, code.as_u16())
            }
            Ok(Err(e)) => (Status::Critical, format!("request to {} failed: {e}", self.uri), 0),
            Err(_) => (
                Status::Critical,
                format!("request to {} timed out after {:?}", self.uri, self.timeout),
                0,
            ),
        };

        if status != Status::Ok {
            tracing::debug!(
                check = %state.name(),
                code,
                message = %message,
                "Dependency unhealthy"
            );
        }
        state.update(status, message, code)?;
        Ok(())
    }
}
