use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord API Token
    /// Env: DISCORD_TOKEN (required at runtime)
    pub discord_token: Option<String>,

    /// Minecraft server to watch, `host` or `host:port`
    /// Env: SERVER_ADDRESS, falling back to SERVER_IP
    pub server_address: Option<String>,

    /// Channel that receives up/down and join alerts
    /// Env: ALERT_CHANNEL_ID (optional; auto check starts on boot only when set)
    pub alert_channel_id: Option<u64>,

    /// User mentioned when the server goes down
    /// Env: PING_USER_ID (optional)
    pub ping_user_id: Option<u64>,

    /// Player data file path
    /// Env: DATA_PATH (default: "player_data.json")
    pub data_path: String,

    /// Discord Command Prefix
    /// Env: COMMAND_PREFIX (default: "mc-info:")
    pub command_prefix: String,

    /// Time between automatic status checks
    /// Env: POLL_INTERVAL_SECS (default: 600)
    pub poll_interval: Duration,

    /// Deadline for one status query
    /// Env: STATUS_TIMEOUT_SECS (default: 5)
    pub status_timeout: Duration,

    /// Port for the read-only HTTP API
    /// Env: HTTP_PORT (optional; API disabled when unset)
    pub http_port: Option<u16>,

    /// Request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Request body size limit in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 1048576 = 1MB)
    pub request_body_limit: usize,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            discord_token: env_optional("DISCORD_TOKEN"),
            server_address: env_optional("SERVER_ADDRESS").or_else(|| env_optional("SERVER_IP")),
            alert_channel_id: env_optional("ALERT_CHANNEL_ID"),
            ping_user_id: env_optional("PING_USER_ID"),
            data_path: env_or_default_string("DATA_PATH", "player_data.json"),
            command_prefix: env_or_default_string("COMMAND_PREFIX", "mc-info:"),
            poll_interval: Duration::from_secs(env_or_default::<u64>("POLL_INTERVAL_SECS", 600).max(1)),
            status_timeout: Duration::from_secs(env_or_default::<u64>("STATUS_TIMEOUT_SECS", 5).max(1)),
            http_port: env_optional("HTTP_PORT"),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", 1024 * 1024),
        }
    }

    /// Create configuration with all default values
    pub fn default() -> Self {
        Self {
            discord_token: None,
            server_address: None,
            alert_channel_id: None,
            ping_user_id: None,
            data_path: "player_data.json".to_string(),
            command_prefix: "mc-info:".to_string(),
            poll_interval: Duration::from_secs(600),
            status_timeout: Duration::from_secs(5),
            http_port: None,
            request_timeout: Duration::from_secs(30),
            request_body_limit: 1024 * 1024, // 1 MB
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_optional(key).unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse environment variable if present and well-formed
fn env_optional<T: std::str::FromStr>(key: &str) -> Option<T> {
    var(key)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .and_then(|val| val.trim().parse().ok())
}
