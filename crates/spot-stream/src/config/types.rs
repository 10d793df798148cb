use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{
    ConnectionConfig, Credentials, DEFAULT_BASE_URL, DEFAULT_KEEPALIVE_INTERVAL_MS,
    DEFAULT_PING_INTERVAL_MS, DEFAULT_REST_URL, HeartbeatSettings, HeartbeatStrategy, StreamMode,
};

/// Root configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfigFile {
    /// REST base URL for listen-key management
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default)]
    pub global: GlobalConfig,
    pub connections: Vec<ConnectionConfigJson>,
}

/// Settings shared by all connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Delay before an abnormally closed connection is restarted
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            restart_delay_ms: default_restart_delay(),
        }
    }
}

impl GlobalConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamModeJson {
    PublicStreams,
    UserData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatJson {
    #[default]
    ExpectedCount,
    Periodic,
}

/// One connection entry (JSON representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfigJson {
    pub name: String,
    pub mode: StreamModeJson,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Public channels, e.g. `btcusdt@depth`
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u64,
    #[serde(default)]
    pub heartbeat: HeartbeatJson,
    /// Falls back to `BINANCE_API_KEY` when absent
    #[serde(default)]
    pub api_key: Option<String>,
    /// Falls back to `BINANCE_API_SECRET` when absent
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl ConnectionConfigJson {
    pub fn is_user_data(&self) -> bool {
        self.mode == StreamModeJson::UserData
    }

    /// Convert to the runtime `ConnectionConfig`
    pub fn to_connection_config(&self, credentials: Option<Credentials>) -> ConnectionConfig {
        let strategy = match self.heartbeat {
            HeartbeatJson::ExpectedCount => HeartbeatStrategy::ExpectedCount,
            HeartbeatJson::Periodic => HeartbeatStrategy::Periodic,
        };

        let mode = match self.mode {
            StreamModeJson::PublicStreams => StreamMode::PublicStreams,
            StreamModeJson::UserData => StreamMode::UserData,
        };

        let mut config = ConnectionConfig::new(self.name.clone(), mode);
        config.public_channels = self.channels.clone();
        if let Some(credentials) = credentials {
            config = config.with_credentials(credentials);
        }

        config
            .with_base_url(self.base_url.clone())
            .with_ping_interval(Duration::from_millis(self.ping_interval_ms))
            .with_keepalive_interval(Duration::from_millis(self.keepalive_interval_ms))
            .with_heartbeat(HeartbeatSettings::default().with_strategy(strategy))
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_rest_url() -> String {
    DEFAULT_REST_URL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_keepalive_interval() -> u64 {
    DEFAULT_KEEPALIVE_INTERVAL_MS
}

fn default_restart_delay() -> u64 {
    5_000
}
