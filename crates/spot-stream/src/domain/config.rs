use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use super::events::Termination;
use crate::error::StreamError;

/// Default streaming gateway
pub const DEFAULT_BASE_URL: &str = "wss://stream.binance.com:9443";
/// Default REST endpoint for the listen-key lifecycle
pub const DEFAULT_REST_URL: &str = "https://api.binance.com";
pub const DEFAULT_PING_INTERVAL_MS: u64 = 5_000;
/// Below the server's 30 minute reap so a single missed renewal is not fatal
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 600_000;

pub const HEARTBEAT_INITIAL_DELAY_MS: u64 = 20_000;
pub const HEARTBEAT_PONG_TIMEOUT_MS: u64 = 4_000;
pub const HEARTBEAT_IDLE_POLL_MS: u64 = 1_000;

/// Sink notified once when a connection terminates
pub type TerminateSink = mpsc::UnboundedSender<Termination>;

/// What the connection subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Unauthenticated market-data channels (`btcusdt@depth`, ...)
    PublicStreams,
    /// Per-account stream bound to a listen key
    UserData,
}

/// API key / secret pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Credentials {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Heartbeat scheduling variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeartbeatStrategy {
    /// Expected-count liveness state machine
    #[default]
    ExpectedCount,
    /// Fixed-cadence ping without liveness detection
    Periodic,
}

/// Heartbeat timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub strategy: HeartbeatStrategy,
    /// Grace period before the first ping
    pub initial_delay: Duration,
    /// How long to wait for a pong after sending a ping
    pub pong_timeout: Duration,
    /// Re-check delay while the peer is producing activity
    pub idle_poll: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        HeartbeatSettings {
            strategy: HeartbeatStrategy::ExpectedCount,
            initial_delay: Duration::from_millis(HEARTBEAT_INITIAL_DELAY_MS),
            pong_timeout: Duration::from_millis(HEARTBEAT_PONG_TIMEOUT_MS),
            idle_poll: Duration::from_millis(HEARTBEAT_IDLE_POLL_MS),
        }
    }
}

impl HeartbeatSettings {
    pub fn with_strategy(mut self, strategy: HeartbeatStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    pub fn with_idle_poll(mut self, poll: Duration) -> Self {
        self.idle_poll = poll;
        self
    }
}

/// Immutable per-connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub name: String,
    pub mode: StreamMode,
    pub public_channels: Vec<String>,
    pub credentials: Option<Credentials>,
    pub base_url: String,
    /// Only used by [`HeartbeatStrategy::Periodic`]
    pub ping_interval: Duration,
    pub keepalive_interval: Duration,
    pub heartbeat: HeartbeatSettings,
    pub catch_terminate: Option<TerminateSink>,
}

impl ConnectionConfig {
    /// Bare config with defaults; prefer the mode-specific constructors
    pub fn new(name: impl Into<String>, mode: StreamMode) -> Self {
        ConnectionConfig {
            name: name.into(),
            mode,
            public_channels: Vec::new(),
            credentials: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            ping_interval: Duration::from_millis(DEFAULT_PING_INTERVAL_MS),
            keepalive_interval: Duration::from_millis(DEFAULT_KEEPALIVE_INTERVAL_MS),
            heartbeat: HeartbeatSettings::default(),
            catch_terminate: None,
        }
    }

    /// Public market-data connection over the given channels
    pub fn public_streams<S: Into<String>>(
        name: impl Into<String>,
        channels: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut config = ConnectionConfig::new(name, StreamMode::PublicStreams);
        config.public_channels = channels.into_iter().map(Into::into).collect();
        config
    }

    /// Authenticated user-data connection
    pub fn user_data(name: impl Into<String>, credentials: Credentials) -> Self {
        let mut config = ConnectionConfig::new(name, StreamMode::UserData);
        config.credentials = Some(credentials);
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatSettings) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_catch_terminate(mut self, sink: TerminateSink) -> Self {
        self.catch_terminate = Some(sink);
        self
    }

    pub fn is_user_data(&self) -> bool {
        self.mode == StreamMode::UserData
    }

    /// Check mode-dependent requirements before any I/O happens
    pub fn validate(&self) -> Result<(), StreamError> {
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
            Ok(url) => {
                return Err(StreamError::Config(format!(
                    "base_url must use ws or wss, got {}",
                    url.scheme()
                )));
            }
            Err(e) => {
                return Err(StreamError::Config(format!(
                    "invalid base_url {}: {}",
                    self.base_url, e
                )));
            }
        }

        match self.mode {
            StreamMode::PublicStreams if self.public_channels.is_empty() => Err(
                StreamError::Config(format!("{}: no public channels configured", self.name)),
            ),
            StreamMode::UserData => match &self.credentials {
                Some(creds) if !creds.api_key.is_empty() => Ok(()),
                _ => Err(StreamError::Config(format!(
                    "{}: user data stream requires an api key",
                    self.name
                ))),
            },
            StreamMode::PublicStreams => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::public_streams("depth", ["btcusdt@depth"]);
        assert_eq!(config.base_url, "wss://stream.binance.com:9443");
        assert_eq!(config.ping_interval, Duration::from_millis(5_000));
        assert_eq!(config.keepalive_interval, Duration::from_secs(600));
        assert_eq!(config.heartbeat.initial_delay, Duration::from_secs(20));
        assert_eq!(config.heartbeat.strategy, HeartbeatStrategy::ExpectedCount);
        assert!(config.catch_terminate.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_public_requires_channels() {
        let config = ConnectionConfig::public_streams("empty", Vec::<String>::new());
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));
    }

    #[test]
    fn test_user_data_requires_api_key() {
        let config = ConnectionConfig::user_data("account", Credentials::new("", "secret"));
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));

        let config = ConnectionConfig::user_data("account", Credentials::new("key", "secret"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_websocket_base() {
        let config = ConnectionConfig::public_streams("depth", ["btcusdt@depth"])
            .with_base_url("https://stream.binance.com");
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));

        let config =
            ConnectionConfig::public_streams("depth", ["btcusdt@depth"]).with_base_url("not a url");
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));
    }

    #[test]
    fn test_secret_is_redacted() {
        let creds = Credentials::new("my-key", "my-secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("my-key"));
        assert!(!debug.contains("my-secret"));
        assert_eq!(creds.secret_key(), "my-secret");
    }
}
