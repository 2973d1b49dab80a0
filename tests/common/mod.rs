//! Shared utilities for integration tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use endpoint_mediator::config::{EndpointConfig, MediatorConfig};
use endpoint_mediator::dispatch::{RequestContext, TransportResponse};
use endpoint_mediator::endpoint::PreparedSend;
use endpoint_mediator::transport::{
    AttemptOutcome, Transport, CONNECTION_FAILED_CODE, SENDING_FAULT_CODE, TIMEOUT_ERROR_CODE,
};

/// What a scripted attempt does.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Ok,
    Timeout,
    Connection,
    Generic,
}

/// Transport that replays scripted outcomes per address and records calls.
///
/// Addresses without a script (or with an exhausted one) succeed.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    always: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue outcomes for `address`, consumed one per attempt.
    pub fn script(&self, address: &str, outcomes: &[Scripted]) {
        self.scripts
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .extend(outcomes.iter().copied());
    }

    /// Every attempt on `address` ends with `outcome`.
    pub fn always(&self, address: &str, outcome: Scripted) {
        self.always.lock().unwrap().insert(address.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self, address: &str) -> Scripted {
        if let Some(outcome) = self.scripts.lock().unwrap().get_mut(address).and_then(VecDeque::pop_front) {
            return outcome;
        }
        self.always.lock().unwrap().get(address).copied().unwrap_or(Scripted::Ok)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn attempt(&self, request: &mut RequestContext, prepared: &PreparedSend) -> AttemptOutcome {
        self.calls.lock().unwrap().push(prepared.address.clone());
        match self.next(&prepared.address) {
            Scripted::Ok => {
                request.set_response(TransportResponse {
                    status: 200,
                    headers: vec![("content-type".into(), "text/plain".into())],
                    body: prepared.address.clone().into_bytes(),
                });
                AttemptOutcome::Success
            }
            Scripted::Timeout => {
                request.mark_timeout();
                request.set_error(TIMEOUT_ERROR_CODE, "read timed out");
                AttemptOutcome::Failure
            }
            Scripted::Connection => {
                request.mark_connection_fault();
                request.set_error(CONNECTION_FAILED_CODE, "connection refused");
                AttemptOutcome::Failure
            }
            Scripted::Generic => {
                request.set_error(SENDING_FAULT_CODE, "upstream returned 503");
                AttemptOutcome::Failure
            }
        }
    }
}

/// HTTP leaf with both retry limits set to `limit`.
#[allow(dead_code)]
pub fn leaf(name: &str, template: &str, limit: u32) -> EndpointConfig {
    let mut ep = EndpointConfig::http(name, template);
    ep.retry.max_fault_retries = limit;
    ep.retry.max_timeout_retries = limit;
    ep
}

#[allow(dead_code)]
pub fn config(endpoints: Vec<EndpointConfig>) -> MediatorConfig {
    MediatorConfig {
        endpoints,
        ..Default::default()
    }
}

/// Start a programmable mock backend. The closure receives the request line.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                let request_line = head.lines().next().unwrap_or_default().to_string();

                let (status, body) = f(request_line).await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    502 => "502 Bad Gateway",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}
