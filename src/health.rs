//! HTTP health and metrics facade.
//!
//! Exposes `/healthcheck` (liveness) and `/metrics` (Prometheus text format).
//! Liveness reports the wrapper itself and is independent of the child
//! process; the child's state shows up in the metrics instead.
//!
//! Uses raw TCP + manual HTTP, two fixed routes do not need a web framework.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{QuickError, Result};

const HEALTHCHECK_BODY: &str = "{\"status\":\"ok\"}";
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// ServiceMetrics
// ============================================================================

/// Lock-free counters and gauges shared by every task of a run.
#[derive(Debug)]
pub struct ServiceMetrics {
    started: Instant,
    pub artifact_downloads: AtomicU64,
    pub artifact_bytes: AtomicU64,
    pub artifact_cache_hits: AtomicU64,
    pub server_running: AtomicBool,
    pub server_restarts: AtomicU64,
    /// `-1` until the child has exited at least once
    pub server_last_exit_code: AtomicI64,
    pub status_online: AtomicBool,
    pub status_players_online: AtomicU64,
    pub status_players_max: AtomicU64,
    pub http_requests: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            artifact_downloads: AtomicU64::new(0),
            artifact_bytes: AtomicU64::new(0),
            artifact_cache_hits: AtomicU64::new(0),
            server_running: AtomicBool::new(false),
            server_restarts: AtomicU64::new(0),
            server_last_exit_code: AtomicI64::new(-1),
            status_online: AtomicBool::new(false),
            status_players_online: AtomicU64::new(0),
            status_players_max: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
        }
    }

    pub fn record_download(&self, bytes: u64) {
        self.artifact_downloads.fetch_add(1, Ordering::Relaxed);
        self.artifact_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.artifact_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_running(&self, running: bool) {
        self.server_running.store(running, Ordering::SeqCst);
    }

    pub fn record_exit(&self, code: Option<i32>) {
        self.server_running.store(false, Ordering::SeqCst);
        self.server_last_exit_code
            .store(code.map(i64::from).unwrap_or(-1), Ordering::SeqCst);
    }

    pub fn record_restart(&self) {
        self.server_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status(&self, online: bool, players_online: u64, players_max: u64) {
        self.status_online.store(online, Ordering::Relaxed);
        self.status_players_online
            .store(players_online, Ordering::Relaxed);
        self.status_players_max.store(players_max, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Render every metric in the Prometheus text exposition format 0.0.4.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);
        let bool_gauge = |b: &AtomicBool| u64::from(b.load(Ordering::Relaxed));

        metric(
            &mut out,
            "quickmc_uptime_seconds",
            "gauge",
            "Seconds since the wrapper started.",
            self.uptime().as_secs_f64(),
        );
        metric(
            &mut out,
            "quickmc_artifact_downloads_total",
            "counter",
            "Verified artifact downloads.",
            self.artifact_downloads.load(Ordering::Relaxed),
        );
        metric(
            &mut out,
            "quickmc_artifact_bytes_downloaded_total",
            "counter",
            "Bytes of verified artifacts downloaded.",
            self.artifact_bytes.load(Ordering::Relaxed),
        );
        metric(
            &mut out,
            "quickmc_artifact_cache_hits_total",
            "counter",
            "Runs that reused the artifact already on disk.",
            self.artifact_cache_hits.load(Ordering::Relaxed),
        );
        metric(
            &mut out,
            "quickmc_server_running",
            "gauge",
            "1 while the server process is alive.",
            bool_gauge(&self.server_running),
        );
        metric(
            &mut out,
            "quickmc_server_restarts_total",
            "counter",
            "Server process restarts.",
            self.server_restarts.load(Ordering::Relaxed),
        );
        metric(
            &mut out,
            "quickmc_server_last_exit_code",
            "gauge",
            "Exit code of the last server process, -1 if none or killed by a signal.",
            self.server_last_exit_code.load(Ordering::Relaxed),
        );
        metric(
            &mut out,
            "quickmc_status_online",
            "gauge",
            "1 if the last status probe reached the server.",
            bool_gauge(&self.status_online),
        );
        metric(
            &mut out,
            "quickmc_status_players_online",
            "gauge",
            "Players online at the last status probe.",
            self.status_players_online.load(Ordering::Relaxed),
        );
        metric(
            &mut out,
            "quickmc_status_players_max",
            "gauge",
            "Player capacity at the last status probe.",
            self.status_players_max.load(Ordering::Relaxed),
        );
        metric(
            &mut out,
            "quickmc_http_requests_total",
            "counter",
            "Requests served by the health facade.",
            self.http_requests.load(Ordering::Relaxed),
        );
        out
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn metric(out: &mut String, name: &str, kind: &str, help: &str, value: impl std::fmt::Display) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
    let _ = writeln!(out, "{} {}", name, value);
}

// ============================================================================
// Routing
// ============================================================================

struct Response {
    status: &'static str,
    content_type: &'static str,
    body: String,
}

fn route(method: &str, path: &str, metrics: &ServiceMetrics) -> Response {
    match (method, path) {
        ("GET", "/healthcheck") => Response {
            status: "200 OK",
            content_type: "application/json",
            body: HEALTHCHECK_BODY.to_string(),
        },
        ("GET", "/metrics") => Response {
            status: "200 OK",
            content_type: METRICS_CONTENT_TYPE,
            body: metrics.render_prometheus(),
        },
        _ => Response {
            status: "404 Not Found",
            content_type: "application/json",
            body: "{\"error\":\"not_found\"}".to_string(),
        },
    }
}

async fn handle_connection(mut stream: TcpStream, metrics: Arc<ServiceMetrics>) {
    let mut buf = [0u8; 1024];
    let n = match tokio::time::timeout(
        Duration::from_secs(READ_TIMEOUT_SECS),
        stream.read(&mut buf),
    )
    .await
    {
        Ok(Ok(n)) if n > 0 => n,
        _ => return,
    };

    let request = String::from_utf8_lossy(&buf[..n]);
    let request_line = request.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let raw_path = parts.next().unwrap_or_default();
    let path = raw_path.split('?').next().unwrap_or(raw_path);

    metrics.http_requests.fetch_add(1, Ordering::Relaxed);
    let response = route(method, path, &metrics);
    debug!(method, path, status = response.status, "Health request");

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(response.body.as_bytes()).await;
    let _ = stream.shutdown().await;
}

// ============================================================================
// Server
// ============================================================================

/// Start the health/metrics server on `host:port`.
///
/// Serves:
/// - `GET /healthcheck` → 200 with body `{"status":"ok"}`
/// - `GET /metrics` → 200 with [`ServiceMetrics::render_prometheus`]
/// - Anything else → 404
///
/// The accept loop stops when `shutdown` flips to `true`.
///
/// # Errors
///
/// [`QuickError::Server`] if the address cannot be bound.
pub async fn start_health_server(
    host: &str,
    port: u16,
    metrics: Arc<ServiceMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<tokio::task::JoinHandle<()>> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| QuickError::Server {
            addr: addr.clone(),
            source,
        })?;
    info!(addr = %addr, "Health server listening on http://{}", addr);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _peer)) => {
                        tokio::spawn(handle_connection(stream, Arc::clone(&metrics)));
                    }
                    Err(e) => warn!(error = %e, "Health server accept error"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Health server stopping");
                        break;
                    }
                }
            }
        }
    });

    Ok(handle)
}

// ============================================================================
// Tests
// ============================================================================
