//! Shared utilities for integration tests.

#![allow(dead_code)]

use healthcheck::{CheckState, HealthCheck, Status, Subscriber, VersionInfo};
use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            204 => "204 No Content",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend that always answers with `status`.
pub async fn start_mock_backend(status: u16) -> SocketAddr {
    start_programmable_backend(move || async move { (status, "mock".to_string()) }).await
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn new_health_check(critical_error_timeout: Duration, interval: Duration) -> HealthCheck {
    HealthCheck::new(
        VersionInfo::with_epoch_build_time("d6cd1e2bd19e03a81132a23b2025920577f84e37", "1.0.0"),
        critical_error_timeout,
        interval,
    )
}

/// Subscriber that records every status it receives.
#[derive(Default)]
pub struct RecordingSubscriber {
    updates: Mutex<Vec<Status>>,
}

impl RecordingSubscriber {
    pub fn updates(&self) -> Vec<Status> {
        self.updates.lock().clone()
    }

    pub fn last(&self) -> Option<Status> {
        self.updates.lock().last().copied()
    }
}

impl Subscriber for RecordingSubscriber {
    fn on_health_update(&self, status: Status) {
        self.updates.lock().push(status);
    }
}

/// Write a fixed result into `state`.
pub fn write(state: &CheckState, status: Status, code: u16) {
    state.update(status, format!("{status}"), code).unwrap();
}
