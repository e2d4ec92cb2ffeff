//! Minecraft server status probe.
//!
//! Speaks the Server List Ping protocol: handshake with next state `1`,
//! status request, JSON status response, then a ping/pong round trip for
//! latency. A failed probe is never an error for the run; it degrades to
//! [`StatusSnapshot::offline`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::StatusConfig;
use crate::error::{QuickError, Result};
use crate::health::ServiceMetrics;
use crate::utils::shutdown;

/// Protocol version sent in the handshake; `-1` means "not a game client".
const PROTOCOL_VERSION: i32 = -1;
const NEXT_STATE_STATUS: i32 = 1;
const MAX_PACKET_LEN: i32 = 2 * 1024 * 1024;

// ============================================================================
// StatusSnapshot
// ============================================================================

/// One observation of the server's public status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub online: bool,
    pub version: Option<String>,
    pub current_players: Option<u64>,
    pub max_players: Option<u64>,
    pub motd: Option<String>,
    pub latency: Option<Duration>,
}

impl StatusSnapshot {
    pub fn offline() -> Self {
        Self::default()
    }

    /// Human-readable report, one entry per output line.
    pub fn render(&self) -> Vec<String> {
        if !self.online {
            return vec!["Server is offline!".to_string()];
        }
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".into());
        let count = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".into());
        vec![
            format!(
                "Server is online running version {} with {} out of {} players.",
                or_unknown(&self.version),
                count(self.current_players),
                count(self.max_players)
            ),
            format!("Message of the day: {}", or_unknown(&self.motd)),
            format!(
                "Latency: {}",
                self.latency
                    .map(|d| format!("{}ms", d.as_millis()))
                    .unwrap_or_else(|| "unknown".into())
            ),
        ]
    }
}

// ============================================================================
// Wire format
// ============================================================================

fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7F == 0 {
            buf.push(v as u8);
            return;
        }
        buf.push((v & 0x7F) as u8 | 0x80);
        v >>= 7;
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<i32> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(invalid_data("VarInt too long"))
}

fn invalid_data(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into())
}

async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    id: i32,
    payload: &[u8],
) -> std::io::Result<()> {
    let mut body = Vec::with_capacity(payload.len() + 5);
    write_varint(&mut body, id);
    body.extend_from_slice(payload);
    let mut frame = Vec::with_capacity(body.len() + 5);
    write_varint(&mut frame, body.len() as i32);
    frame.extend_from_slice(&body);
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Read one frame and return `(packet id, payload)`.
async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<(i32, Vec<u8>)> {
    let len = read_varint(reader).await?;
    if !(1..=MAX_PACKET_LEN).contains(&len) {
        return Err(invalid_data(format!("bad packet length {}", len)));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    let mut cursor = std::io::Cursor::new(body);
    let id = read_varint(&mut cursor).await?;
    let pos = cursor.position() as usize;
    let mut body = cursor.into_inner();
    Ok((id, body.split_off(pos)))
}

fn handshake_payload(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(host.len() + 10);
    write_varint(&mut payload, PROTOCOL_VERSION);
    write_string(&mut payload, host);
    payload.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut payload, NEXT_STATE_STATUS);
    payload
}

// ============================================================================
// Status response
// ============================================================================

#[derive(Debug, Deserialize)]
struct StatusResponse {
    version: Option<VersionField>,
    players: Option<PlayersField>,
    #[serde(default)]
    description: Value,
}

#[derive(Debug, Deserialize)]
struct VersionField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlayersField {
    max: u64,
    online: u64,
}

/// Flatten a chat component (plain string, object with `text`/`extra`, or
/// array) into plain text without `§` formatting codes.
fn flatten_motd(value: &Value) -> String {
    fn collect(value: &Value, out: &mut String) {
        match value {
            Value::String(s) => out.push_str(s),
            Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            Value::Object(map) => {
                if let Some(text) = map.get("text") {
                    collect(text, out);
                }
                if let Some(extra) = map.get("extra") {
                    collect(extra, out);
                }
            }
            _ => {}
        }
    }

    let mut raw = String::new();
    collect(value, &mut raw);

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

fn snapshot_from_json(json: &str, latency: Option<Duration>) -> Result<StatusSnapshot> {
    let response: StatusResponse = serde_json::from_str(json)?;
    let motd = flatten_motd(&response.description);
    Ok(StatusSnapshot {
        online: true,
        version: response.version.map(|v| v.name),
        current_players: response.players.as_ref().map(|p| p.online),
        max_players: response.players.as_ref().map(|p| p.max),
        motd: (!motd.is_empty()).then_some(motd),
        latency,
    })
}

// ============================================================================
// Probe
// ============================================================================

async fn exchange(stream: &mut TcpStream, host: &str, port: u16) -> Result<StatusSnapshot> {
    write_packet(stream, 0x00, &handshake_payload(host, port)).await?;
    write_packet(stream, 0x00, &[]).await?;

    let (id, payload) = read_packet(stream).await?;
    if id != 0x00 {
        return Err(invalid_data(format!("unexpected status packet id {:#04x}", id)).into());
    }
    let mut cursor = std::io::Cursor::new(payload);
    let json_len = read_varint(&mut cursor).await?;
    let start = cursor.position() as usize;
    let payload = cursor.into_inner();
    let json = payload
        .get(start..start + json_len.max(0) as usize)
        .ok_or_else(|| invalid_data("truncated status response"))?;
    let json = String::from_utf8_lossy(json);

    let latency = ping(stream).await;
    snapshot_from_json(&json, latency)
}

/// Ping/pong round trip. Servers that skip it are still online.
async fn ping(stream: &mut TcpStream) -> Option<Duration> {
    let token = chrono::Utc::now().timestamp_millis();
    let sent = Instant::now();
    write_packet(stream, 0x01, &token.to_be_bytes()).await.ok()?;
    match read_packet(stream).await {
        Ok((0x01, pong)) if pong[..] == token.to_be_bytes()[..] => Some(sent.elapsed()),
        Ok(_) | Err(_) => None,
    }
}

/// Query `host:port` once, failing on any network or protocol error.
pub async fn query(host: &str, port: u16, timeout: Duration) -> Result<StatusSnapshot> {
    let addr = format!("{}:{}", host, port);
    let attempt = async {
        let mut stream = TcpStream::connect(&addr).await?;
        exchange(&mut stream, host, port).await
    };
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(QuickError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("status probe of {} timed out", addr),
        ))),
    }
}

/// Query `host:port`, degrading every failure to an offline snapshot.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> StatusSnapshot {
    match query(host, port, timeout).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(host, port, error = %e, "Status probe failed");
            StatusSnapshot::offline()
        }
    }
}

/// Report lines for `host:port`: a header followed by the rendered snapshot.
pub fn report_lines(host: &str, port: u16, snapshot: &StatusSnapshot) -> Vec<String> {
    let mut lines = vec![format!(
        "Minecraft server status of {} on port {}:",
        host, port
    )];
    lines.extend(snapshot.render());
    lines
}

/// Log `snapshot` and mirror it into the metrics.
pub fn report(host: &str, port: u16, snapshot: &StatusSnapshot, metrics: &ServiceMetrics) {
    for line in report_lines(host, port, snapshot) {
        info!("{}", line);
    }
    metrics.record_status(
        snapshot.online,
        snapshot.current_players.unwrap_or(0),
        snapshot.max_players.unwrap_or(0),
    );
}

/// Probe once after `config.grace_secs`, unless shutdown comes first.
///
/// The task yields the snapshot it reported, or `None` when cancelled.
pub fn spawn_status_report(
    config: StatusConfig,
    metrics: Arc<ServiceMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<Option<StatusSnapshot>> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.grace_secs)) => {}
            _ = shutdown::requested(&mut shutdown_rx) => {
                debug!("Status report cancelled");
                return None;
            }
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let snapshot = tokio::select! {
            snapshot = probe(&config.host, config.port, timeout) => snapshot,
            _ = shutdown::requested(&mut shutdown_rx) => return None,
        };
        report(&config.host, config.port, &snapshot, &metrics);
        Some(snapshot)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use tokio::net::TcpListener;

    const STATUS_JSON: &str = r#"{
        "version": {"name": "Paper 1.21", "protocol": 767},
        "players": {"max": 20, "online": 3, "sample": []},
        "description": {"text": "", "extra": [{"text": "§aA "}, {"text": "Minecraft Server"}]}
    }"#;

    /// Minimal server answering one status exchange.
    async fn fake_server(json: &'static str, answer_ping: bool) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let (id, handshake) = read_packet(&mut stream).await.unwrap();
            assert_eq!(id, 0x00);
            assert_eq!(*handshake.last().unwrap(), NEXT_STATE_STATUS as u8);
            let (id, request) = read_packet(&mut stream).await.unwrap();
            assert_eq!(id, 0x00);
            assert!(request.is_empty());

            let mut payload = Vec::new();
            write_string(&mut payload, json);
            write_packet(&mut stream, 0x00, &payload).await.unwrap();

            if answer_ping {
                let (id, token) = read_packet(&mut stream).await.unwrap();
                assert_eq!(id, 0x01);
                write_packet(&mut stream, 0x01, &token).await.unwrap();
            }
        });
        port
    }

    #[test]
    fn test_varint_encoding() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (25565, &[0xdd, 0xc7, 0x01]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, bytes) in cases {
            let mut buf = Vec::new();
            write_varint(&mut buf, *value);
            assert_eq!(buf.as_slice(), *bytes, "encoding {}", value);
            let decoded =
                tokio_test::block_on(read_varint(&mut std::io::Cursor::new(buf))).unwrap();
            assert_eq!(decoded, *value);
        }
    }

    #[tokio::test]
    async fn test_varint_too_long() {
        let bytes = vec![0xffu8; 6];
        let err = read_varint(&mut std::io::Cursor::new(bytes)).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_handshake_payload() {
        let payload = handshake_payload("localhost", 25565);
        let mut expected = vec![0xff, 0xff, 0xff, 0xff, 0x0f, 9];
        expected.extend_from_slice(b"localhost");
        expected.extend_from_slice(&[0x63, 0xdd, 0x01]);
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_flatten_motd_variants() {
        assert_eq!(flatten_motd(&Value::String("§6Hello §rworld".into())), "Hello world");
        let component: Value = serde_json::from_str(
            r#"{"text":"A ","extra":[{"text":"Paper","bold":true},[" ", {"text":"server"}]]}"#,
        )
        .unwrap();
        assert_eq!(flatten_motd(&component), "A Paper server");
        assert_eq!(flatten_motd(&Value::Null), "");
    }

    #[test]
    fn test_render_online() {
        let snapshot = StatusSnapshot {
            online: true,
            version: Some("Paper 1.21".into()),
            current_players: Some(3),
            max_players: Some(20),
            motd: Some("A Minecraft Server".into()),
            latency: Some(Duration::from_millis(12)),
        };
        assert_eq!(
            snapshot.render(),
            vec![
                "Server is online running version Paper 1.21 with 3 out of 20 players.",
                "Message of the day: A Minecraft Server",
                "Latency: 12ms",
            ]
        );
    }

    #[test]
    fn test_render_offline() {
        assert_eq!(StatusSnapshot::offline().render(), vec!["Server is offline!"]);
    }

    #[tokio::test]
    async fn test_probe_online() {
        let port = fake_server(STATUS_JSON, true).await;

        let snapshot = probe("127.0.0.1", port, Duration::from_secs(2)).await;

        assert!(snapshot.online);
        assert_eq!(snapshot.version.as_deref(), Some("Paper 1.21"));
        assert_eq!(snapshot.current_players, Some(3));
        assert_eq!(snapshot.max_players, Some(20));
        assert_eq!(snapshot.motd.as_deref(), Some("A Minecraft Server"));
        assert!(snapshot.latency.is_some());
    }

    #[tokio::test]
    async fn test_probe_without_pong_still_online() {
        let port = fake_server(r#"{"version":{"name":"1.21"},"description":"hi"}"#, false).await;

        let snapshot = probe("127.0.0.1", port, Duration::from_secs(2)).await;

        assert!(snapshot.online);
        assert_eq!(snapshot.motd.as_deref(), Some("hi"));
        assert_eq!(snapshot.current_players, None);
        assert_eq!(snapshot.latency, None);
    }

    #[tokio::test]
    async fn test_probe_closed_port_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let snapshot = probe("127.0.0.1", port, Duration::from_secs(2)).await;

        assert_eq!(snapshot, StatusSnapshot::offline());
    }

    #[tokio::test]
    async fn test_query_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _hold = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = query("127.0.0.1", port, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_report_lines_start_with_header() {
        let lines = report_lines("localhost", 25565, &StatusSnapshot::offline());
        assert_eq!(
            lines,
            vec![
                "Minecraft server status of localhost on port 25565:".to_string(),
                "Server is offline!".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_offline() {
        let port = fake_server("not json", false).await;
        let snapshot = probe("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(!snapshot.online);
    }

    #[tokio::test]
    async fn test_status_report_records_metrics() {
        let port = fake_server(STATUS_JSON, true).await;
        let metrics = Arc::new(ServiceMetrics::new());
        let (_tx, rx) = shutdown::channel();
        let config = StatusConfig {
            host: "127.0.0.1".into(),
            port,
            grace_secs: 0,
            ..StatusConfig::default()
        };

        let snapshot = spawn_status_report(config, Arc::clone(&metrics), rx)
            .await
            .unwrap()
            .unwrap();

        assert!(snapshot.online);
        assert!(metrics.status_online.load(Ordering::Relaxed));
        assert_eq!(metrics.status_players_online.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.status_players_max.load(Ordering::Relaxed), 20);
    }

    #[tokio::test]
    async fn test_status_report_cancelled_during_grace() {
        let (tx, rx) = shutdown::channel();
        let config = StatusConfig {
            grace_secs: 3600,
            ..StatusConfig::default()
        };
        let handle = spawn_status_report(config, Arc::new(ServiceMetrics::new()), rx);

        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result, None);
    }
}
