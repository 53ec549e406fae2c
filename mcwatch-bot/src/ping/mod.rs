//! Snapshot source: queries a Minecraft Java server for its status.

pub mod protocol;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mcwatch_db::Snapshot;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 25565;

const FAVICON_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Error)]
pub enum PingError {
    #[error("server did not respond within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid server address '{0}'")]
    InvalidAddress(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed status response: {0}")]
    Json(#[from] serde_json::Error),
}

impl PingError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PingError::Timeout(_))
    }
}

/// Host and port of a Java edition server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`.
    pub fn parse(input: &str) -> Result<Self, PingError> {
        let input = input.trim();
        let invalid = || PingError::InvalidAddress(input.to_string());

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
            match after {
                "" => (host, None),
                _ => (host, Some(after.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match input.rsplit_once(':') {
                // More than one colon without brackets is a bare IPv6 address
                Some((host, _)) if host.contains(':') => (input, None),
                Some((host, port)) => (host, Some(port)),
                None => (input, None),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Point-in-time status of the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    /// Round trip of the status exchange in milliseconds
    pub latency_ms: u64,
    /// Version name the server reports (e.g. "Paper 1.21.1")
    pub version: String,
    pub online: i64,
    pub max: i64,
    /// Message of the day with formatting codes removed
    pub motd: String,
    /// Visible player names; `None` when the server hides the list
    pub sample: Option<Vec<String>>,
    /// Raw `data:image/png;base64,...` favicon
    pub favicon: Option<String>,
}

#[derive(Deserialize)]
struct RawStatus {
    #[serde(default)]
    version: Option<RawVersion>,
    #[serde(default)]
    players: Option<RawPlayers>,
    #[serde(default)]
    description: Value,
    #[serde(default)]
    favicon: Option<String>,
}

#[derive(Deserialize)]
struct RawVersion {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct RawPlayers {
    #[serde(default)]
    max: i64,
    #[serde(default)]
    online: i64,
    #[serde(default)]
    sample: Option<Vec<RawSamplePlayer>>,
}

#[derive(Deserialize)]
struct RawSamplePlayer {
    name: String,
}

impl ServerStatus {
    /// Build from the JSON body of a status response.
    pub fn from_json(json: &str, latency: Duration) -> Result<Self, PingError> {
        let raw: RawStatus = serde_json::from_str(json)?;
        let players = raw.players.unwrap_or(RawPlayers {
            max: 0,
            online: 0,
            sample: None,
        });

        let mut motd = String::new();
        flatten_chat(&raw.description, &mut motd);

        Ok(Self {
            latency_ms: latency.as_millis() as u64,
            version: raw.version.map(|v| v.name).unwrap_or_default(),
            online: players.online,
            max: players.max,
            motd: strip_formatting(&motd),
            sample: players
                .sample
                .map(|sample| sample.into_iter().map(|p| p.name).collect()),
            favicon: raw.favicon,
        })
    }

    /// Visible players as a tracker snapshot. Hidden lists give an empty set.
    pub fn snapshot(&self, taken_at: i64) -> Snapshot {
        Snapshot::new(taken_at, self.sample.iter().flatten().cloned())
    }

    /// Decoded favicon PNG, if the server sent a well-formed one.
    pub fn favicon_png(&self) -> Option<Vec<u8>> {
        let encoded = self.favicon.as_deref()?.strip_prefix(FAVICON_PREFIX)?;
        let encoded: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(encoded).ok()
    }
}

/// Append the plain text of a chat component (string, object or list).
fn flatten_chat(value: &Value, out: &mut String) {
    match value {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| flatten_chat(part, out)),
        Value::Object(component) => {
            if let Some(Value::String(text)) = component.get("text") {
                out.push_str(text);
            }
            if let Some(Value::Array(extra)) = component.get("extra") {
                extra.iter().for_each(|part| flatten_chat(part, out));
            }
        }
        _ => {}
    }
}

/// Remove `§x` colour and style codes.
fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Anything that can report the server's current status.
pub trait SnapshotSource: Send + Sync + 'static {
    fn status(&self) -> impl Future<Output = Result<ServerStatus, PingError>> + Send;
}

/// Server list ping client with a hard deadline per query.
#[derive(Debug, Clone)]
pub struct StatusClient {
    address: ServerAddress,
    timeout: Duration,
}

impl StatusClient {
    pub fn new(address: ServerAddress, timeout: Duration) -> Self {
        Self { address, timeout }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    async fn exchange(&self) -> Result<ServerStatus, PingError> {
        let mut stream = TcpStream::connect((self.address.host.as_str(), self.address.port)).await?;
        stream.set_nodelay(true)?;

        let mut request = protocol::handshake_packet(&self.address.host, self.address.port);
        request.extend(protocol::status_request_packet());

        let started = Instant::now();
        stream.write_all(&request).await?;
        let (packet_id, payload) = protocol::read_packet(&mut stream).await?;
        let latency = started.elapsed();

        if packet_id != protocol::STATUS_RESPONSE_ID {
            return Err(PingError::Protocol(format!(
                "expected status response, got packet {:#04x}",
                packet_id
            )));
        }

        let json = protocol::read_string(&payload)?;
        ServerStatus::from_json(&json, latency)
    }
}

impl SnapshotSource for StatusClient {
    async fn status(&self) -> Result<ServerStatus, PingError> {
        let status = tokio::time::timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| PingError::Timeout(self.timeout))??;

        debug!(
            address = %self.address,
            latency_ms = status.latency_ms,
            online = status.online,
            visible = status.sample.as_ref().map_or(0, Vec::len),
            "server status"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const STATUS_JSON: &str = r#"{
        "version": {"name": "Paper 1.21.1", "protocol": 767},
        "players": {
            "max": 20,
            "online": 2,
            "sample": [
                {"name": "Steve", "id": "8667ba71-b85a-4004-af54-457a9734eed7"},
                {"name": "Alex", "id": "ec561538-f3fd-461d-aff5-086b22154bce"}
            ]
        },
        "description": {"text": "§aA ", "extra": [{"text": "Minecraft"}, " Server"]},
        "favicon": "data:image/png;base64,iVBORw0KGgo="
    }"#;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            ServerAddress::parse("mc.example.org").unwrap(),
            ServerAddress {
                host: "mc.example.org".to_string(),
                port: 25565
            }
        );
        assert_eq!(ServerAddress::parse("10.0.0.5:25570").unwrap().port, 25570);
        assert_eq!(
            ServerAddress::parse("[::1]:19132").unwrap(),
            ServerAddress {
                host: "::1".to_string(),
                port: 19132
            }
        );
        assert_eq!(ServerAddress::parse("::1").unwrap().port, DEFAULT_PORT);
        assert_eq!(ServerAddress::parse("[::1]").unwrap().host, "::1");
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(ServerAddress::parse("").is_err());
        assert!(ServerAddress::parse(":25565").is_err());
        assert!(ServerAddress::parse("host:notaport").is_err());
        assert!(ServerAddress::parse("host:70000").is_err());
        assert!(ServerAddress::parse("[::1").is_err());
    }

    #[test]
    fn test_address_display() {
        assert_eq!(ServerAddress::parse("play.example.net").unwrap().to_string(), "play.example.net:25565");
        assert_eq!(ServerAddress::parse("[::1]:1").unwrap().to_string(), "[::1]:1");
    }

    #[test]
    fn test_status_from_json() {
        let status = ServerStatus::from_json(STATUS_JSON, Duration::from_millis(42)).unwrap();

        assert_eq!(status.latency_ms, 42);
        assert_eq!(status.version, "Paper 1.21.1");
        assert_eq!(status.online, 2);
        assert_eq!(status.max, 20);
        assert_eq!(status.motd, "A Minecraft Server");
        assert_eq!(status.sample, Some(vec!["Steve".to_string(), "Alex".to_string()]));
        assert_eq!(status.favicon_png(), Some(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]));

        let snapshot = status.snapshot(1700000000);
        assert_eq!(snapshot.taken_at, 1700000000);
        assert!(snapshot.players.contains("Steve"));
        assert!(snapshot.players.contains("Alex"));
    }

    #[test]
    fn test_hidden_sample_gives_empty_snapshot() {
        let json = json!({
            "players": {"max": 100, "online": 37},
            "description": "Plain motd"
        });
        let status = ServerStatus::from_json(&json.to_string(), Duration::ZERO).unwrap();

        assert_eq!(status.online, 37);
        assert_eq!(status.sample, None);
        assert_eq!(status.motd, "Plain motd");
        assert_eq!(status.favicon_png(), None);
        assert!(status.snapshot(0).players.is_empty());
    }

    #[test]
    fn test_bad_favicon_is_ignored() {
        let json = json!({"description": "", "favicon": "data:image/png;base64,@@@"});
        let status = ServerStatus::from_json(&json.to_string(), Duration::ZERO).unwrap();
        assert_eq!(status.favicon_png(), None);
    }

    #[test]
    fn test_malformed_json_is_error() {
        let result = ServerStatus::from_json("<html>", Duration::ZERO);
        assert!(matches!(result, Err(PingError::Json(_))));
    }

    /// Accepts one connection, checks the handshake and answers with `body`.
    async fn fake_server(body: &'static str) -> ServerAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let (id, handshake) = protocol::read_packet(&mut socket).await.unwrap();
            assert_eq!(id, 0x00);
            assert_eq!(*handshake.last().unwrap(), 0x01);
            let (id, request) = protocol::read_packet(&mut socket).await.unwrap();
            assert_eq!(id, 0x00);
            assert!(request.is_empty());

            let mut payload = Vec::new();
            protocol::write_string(&mut payload, body);
            socket
                .write_all(&protocol::frame(protocol::STATUS_RESPONSE_ID, &payload))
                .await
                .unwrap();
        });

        ServerAddress {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_status_against_fake_server() {
        let address = fake_server(STATUS_JSON).await;
        let client = StatusClient::new(address, Duration::from_secs(5));

        let status = client.status().await.unwrap();
        assert_eq!(status.online, 2);
        assert_eq!(status.sample.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut sink = Vec::new();
            let _ = socket.read_to_end(&mut sink).await;
        });

        let client = StatusClient::new(
            ServerAddress {
                host: "127.0.0.1".to_string(),
                port,
            },
            Duration::from_millis(200),
        );

        let err = client.status().await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_timeout() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = StatusClient::new(
            ServerAddress {
                host: "127.0.0.1".to_string(),
                port,
            },
            Duration::from_secs(5),
        );

        let err = client.status().await.unwrap_err();
        assert!(matches!(err, PingError::Io(_)));
    }
}
