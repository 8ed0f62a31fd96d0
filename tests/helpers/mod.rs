#![allow(dead_code)] // Test helpers appear unused when compiled independently

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

const WAIT_ATTEMPTS: usize = 50;
const WAIT_DELAY: Duration = Duration::from_millis(100);

/// Find an available TCP port
pub async fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

pub async fn poll_until<T, F, Fut>(mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..WAIT_ATTEMPTS {
        if let Some(result) = f().await {
            return Some(result);
        }
        tokio::time::sleep(WAIT_DELAY).await;
    }
    None
}

/// One accepted `/write` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub db: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Clone, Default)]
struct InfluxState {
    writes: Arc<Mutex<Vec<WriteRequest>>>,
    fail_with: Arc<Mutex<Option<u16>>>,
}

pub struct MockInflux {
    pub port: u16,
    state: InfluxState,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockInflux {
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn writes(&self) -> Vec<WriteRequest> {
        self.state.writes.lock().await.clone()
    }

    /// Answer every following write with `status`, or accept again with `None`.
    pub async fn fail_with(&self, status: Option<u16>) {
        *self.state.fail_with.lock().await = status;
    }

    /// Wait until at least `min_count` writes have been accepted.
    pub async fn wait_for_writes(&self, min_count: usize) -> Vec<WriteRequest> {
        poll_until(|| async {
            let writes = self.writes().await;
            (writes.len() >= min_count).then_some(writes)
        })
        .await
        .unwrap_or_else(|| panic!("timed out waiting for {} writes", min_count))
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Spawn an InfluxDB stand-in serving `/write`, `/ping`, `/records` and `/reset`.
pub async fn spawn_mock_influx(port: u16) -> MockInflux {
    let state = InfluxState::default();

    let app = Router::new()
        .route("/write", post(write))
        .route("/ping", get(ping))
        .route("/records", get(records))
        .route("/reset", post(reset))
        .with_state(state.clone());

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind mock influx listener");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("mock influx server error: {}", err);
        }
    });

    MockInflux {
        port,
        state,
        shutdown_tx,
        handle,
    }
}

async fn write(
    State(state): State<InfluxState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(status) = *state.fail_with.lock().await {
        return StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let body = String::from_utf8_lossy(&body).into_owned();
    if body.trim().is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    state.writes.lock().await.push(WriteRequest {
        db: params.get("db").cloned(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    StatusCode::NO_CONTENT
}

async fn ping() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn records(State(state): State<InfluxState>) -> Json<Vec<WriteRequest>> {
    Json(state.writes.lock().await.clone())
}

async fn reset(State(state): State<InfluxState>) -> StatusCode {
    state.writes.lock().await.clear();
    StatusCode::NO_CONTENT
}

/// Single-client APRS-IS stand-in: banner, `logresp`, then whatever is fed
/// through [`MockAprsIs::feed`]. Lines sent by the client are recorded.
pub struct MockAprsIs {
    pub port: u16,
    received: Arc<Mutex<Vec<String>>>,
    feed: mpsc::UnboundedSender<Option<String>>,
    handle: JoinHandle<()>,
}

impl MockAprsIs {
    pub fn feed(&self, line: &str) {
        let _ = self.feed.send(Some(line.to_string()));
    }

    /// Close the server side of the connection.
    pub fn hang_up(&self) {
        let _ = self.feed.send(None);
    }

    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    pub async fn wait_for_received(&self, pattern: &str) -> String {
        poll_until(|| async {
            self.received()
                .await
                .into_iter()
                .find(|line| line.contains(pattern))
        })
        .await
        .unwrap_or_else(|| panic!("timed out waiting for client line containing {:?}", pattern))
    }

    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

pub async fn spawn_mock_aprs_is(port: u16, verified: bool) -> MockAprsIs {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind mock APRS-IS listener");
    let received = Arc::new(Mutex::new(Vec::new()));
    let (feed, mut lines) = mpsc::unbounded_channel::<Option<String>>();

    let log = Arc::clone(&received);
    let handle = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read).lines();

        if write.write_all(b"# aprsc 2.1.14-g5e22b37\r\n").await.is_err() {
            return;
        }
        let Ok(Some(login)) = reader.next_line().await else {
            return;
        };
        let call = login.split_whitespace().nth(1).unwrap_or("NOCALL").to_string();
        log.lock().await.push(login);

        let status = if verified { "verified" } else { "unverified" };
        let logresp = format!("# logresp {} {}, server T2MOCK\r\n", call, status);
        if write.write_all(logresp.as_bytes()).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                line = lines.recv() => match line {
                    Some(Some(line)) => {
                        if write.write_all(format!("{}\r\n", line).as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    _ => {
                        let _ = write.shutdown().await;
                        return;
                    }
                },
                line = reader.next_line() => match line {
                    Ok(Some(line)) => log.lock().await.push(line),
                    _ => return,
                },
            }
        }
    });

    MockAprsIs {
        port,
        received,
        feed,
        handle,
    }
}
