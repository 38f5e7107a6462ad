/// Configuration schema definitions
///
/// Each module reads its own section; the section name matches the module id
/// it belongs to ("hub", "display"). Missing sections and fields fall back
/// to the defaults below, so a minimal config only needs `[hub] url`.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub modules: ModulesConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Module loader behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// What to do when two modules declare the same id
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Later registration replaces the earlier one (logged as a warning)
    #[default]
    Overwrite,
    /// Later registration is rejected with a load error
    Error,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Overwrite,
        }
    }
}

/// Upstream hub connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Base URL of the hub, e.g. "http://homeassistant.local:8123"
    #[serde(default)]
    pub url: String,

    /// Long-lived access token for the auth handshake and HTTP calls
    #[serde(default)]
    pub access_token: Option<String>,

    /// Seconds between heartbeat pings on the hub socket
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Seconds to wait before reconnecting after a close or error
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: None,
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

/// Downstream display server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Bind address for the display WebSocket server
    #[serde(default = "default_display_host")]
    pub host: String,

    /// Listen port for the display WebSocket server
    #[serde(default = "default_display_port")]
    pub port: u16,

    /// Optional shared secret; clients must pass ?accessToken=<token>
    #[serde(default)]
    pub access_token: Option<String>,

    /// Seconds a client may stay silent before it is disconnected
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
}

fn default_display_host() -> String {
    "127.0.0.1".to_string()
}

fn default_display_port() -> u16 {
    4365
}

fn default_client_timeout_secs() -> u64 {
    21
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            host: default_display_host(),
            port: default_display_port(),
            access_token: None,
            client_timeout_secs: default_client_timeout_secs(),
        }
    }
}
