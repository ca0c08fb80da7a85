//! `/health` endpoint over a real listener.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use healthcheck::http::X_REQUEST_ID;
use healthcheck::{BoxError, CheckState, HealthCheck, HealthReport, HttpServer, Status};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

mod common;

async fn noop(_cancel: CancellationToken, _state: Arc<CheckState>) -> Result<(), BoxError> {
    Ok(())
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn serve(health: HealthCheck) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(HttpServer::new(health).run(listener, shutdown.clone()));
    (addr, shutdown)
}

#[tokio::test]
async fn test_status_codes_follow_health() {
    let health = common::new_health_check(Duration::from_secs(600), Duration::from_secs(60));
    let check = health.add_and_get_check("db", noop).unwrap();
    let (addr, shutdown) = serve(health.clone()).await;
    let url = format!("http://{addr}/health");

    // Never run: starting up.
    let res = client().get(&url).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 429);
    let report: HealthReport = res.json().await.unwrap();
    assert_eq!(report.status, Status::Warning);
    assert_eq!(report.checks[0].status, None);

    common::write(check.state(), Status::Ok, 200);
    let res = client().get(&url).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let report: HealthReport = res.json().await.unwrap();
    assert_eq!(report.status, Status::Ok);
    assert_eq!(report.version.git_commit, "d6cd1e2bd19e03a81132a23b2025920577f84e37");
    assert_eq!(report.checks[0].status_code, 200);

    shutdown.cancel();
}

#[tokio::test]
async fn test_escalated_failure_returns_500() {
    let health = common::new_health_check(Duration::from_millis(50), Duration::from_secs(60));
    let check = health.add_and_get_check("db", noop).unwrap();
    let (addr, shutdown) = serve(health.clone()).await;
    let url = format!("http://{addr}/health");

    common::write(check.state(), Status::Critical, 503);
    assert_eq!(client().get(&url).send().await.unwrap().status().as_u16(), 429);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let res = client().get(&url).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 500);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["status"], "CRITICAL");
    assert_eq!(json["checks"][0]["status"], "CRITICAL");
    assert_eq!(json["checks"][0]["status_code"], 503);

    shutdown.cancel();
}

#[tokio::test]
async fn test_request_id_is_assigned_and_propagated() {
    let health = common::new_health_check(Duration::from_secs(600), Duration::from_secs(60));
    let router = HttpServer::new(health).router();

    let res = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let generated = res.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let res = router
        .oneshot(
            Request::get("/health")
                .header(X_REQUEST_ID, "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.headers().get(X_REQUEST_ID).unwrap(), "req-42");
}

#[tokio::test]
async fn test_unknown_route() {
    let health = common::new_health_check(Duration::from_secs(600), Duration::from_secs(60));
    let router = HttpServer::new(health).router();
    let res = router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
