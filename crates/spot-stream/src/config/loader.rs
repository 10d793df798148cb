use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::types::{ConnectionConfigJson, StreamConfigFile, StreamModeJson};
use crate::domain::Credentials;

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const API_SECRET_ENV: &str = "BINANCE_API_SECRET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No enabled connections in config")]
    NoEnabledConnections,
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load stream configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StreamConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: StreamConfigFile = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<StreamConfigFile, ConfigError> {
    let config: StreamConfigFile = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<StreamConfigFile, ConfigError> {
    let default_config = include_str!("default_config.json");
    load_config_from_str(default_config)
}

/// Resolve API credentials from the config entry, falling back to
/// `BINANCE_API_KEY` / `BINANCE_API_SECRET`. Empty strings count as absent.
pub fn resolve_credentials(
    config_api_key: Option<String>,
    config_secret_key: Option<String>,
) -> Result<Credentials, ConfigError> {
    let non_empty = |value: String| if value.is_empty() { None } else { Some(value) };

    let api_key = config_api_key
        .and_then(non_empty)
        .or_else(|| std::env::var(API_KEY_ENV).ok().and_then(non_empty))
        .ok_or_else(|| {
            ConfigError::Invalid(format!("{API_KEY_ENV} not found in config or environment"))
        })?;

    let secret_key = config_secret_key
        .and_then(non_empty)
        .or_else(|| std::env::var(API_SECRET_ENV).ok().and_then(non_empty))
        .ok_or_else(|| {
            ConfigError::Invalid(format!("{API_SECRET_ENV} not found in config or environment"))
        })?;

    Ok(Credentials::new(api_key, secret_key))
}

impl ConnectionConfigJson {
    /// Credentials for this entry; `None` for public streams
    pub fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        if !self.is_user_data() {
            return Ok(None);
        }
        resolve_credentials(self.api_key.clone(), self.secret_key.clone()).map(Some)
    }
}

impl StreamConfigFile {
    /// Get only enabled connections
    pub fn enabled_connections(&self) -> Vec<&ConnectionConfigJson> {
        self.connections.iter().filter(|c| c.enabled).collect()
    }

    /// Get a specific connection by name
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionConfigJson, ConfigError> {
        self.connections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ConfigError::ConnectionNotFound(name.to_string()))
    }

    /// Validate the configuration. Credentials are resolved later, at start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_connections().is_empty() {
            return Err(ConfigError::NoEnabledConnections);
        }

        let mut names = HashSet::new();
        for connection in &self.connections {
            if !names.insert(connection.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate connection name: {}",
                    connection.name
                )));
            }
        }

        for connection in self.enabled_connections() {
            if connection.mode == StreamModeJson::PublicStreams && connection.channels.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{}: public_streams requires at least one channel",
                    connection.name
                )));
            }
            match url::Url::parse(&connection.base_url) {
                Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{}: base_url must be a ws:// or wss:// URL",
                        connection.name
                    )));
                }
            }
        }

        if let Err(e) = url::Url::parse(&self.rest_url) {
            return Err(ConfigError::Invalid(format!("rest_url: {}", e)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HeartbeatStrategy, StreamMode};
    use std::time::Duration;

    #[test]
    fn test_load_default_config() {
        let config = load_default_config().unwrap();
        assert!(!config.connections.is_empty());
        assert_eq!(config.rest_url, "https://api.binance.com");
        config.validate().unwrap();
    }

    #[test]
    fn test_enabled_connections() {
        let config = load_default_config().unwrap();
        let enabled = config.enabled_connections();
        assert!(enabled.iter().any(|c| c.name == "btc-depth"));
        // user data needs credentials, off by default
        assert!(!enabled.iter().any(|c| c.name == "account"));
    }

    #[test]
    fn test_get_connection() {
        let config = load_default_config().unwrap();
        let depth = config.get_connection("btc-depth").unwrap();
        assert_eq!(depth.channels, vec!["btcusdt@depth".to_string()]);
        assert!(matches!(
            config.get_connection("missing"),
            Err(ConfigError::ConnectionNotFound(_))
        ));
    }

    #[test]
    fn test_defaults_applied() {
        let config = load_config_from_str(
            r#"{"connections": [{"name": "t", "mode": "public_streams", "channels": ["btcusdt@trade"]}]}"#,
        )
        .unwrap();
        assert_eq!(config.global.restart_delay(), Duration::from_secs(5));

        let runtime = config.connections[0].to_connection_config(None);
        assert_eq!(runtime.mode, StreamMode::PublicStreams);
        assert_eq!(runtime.base_url, "wss://stream.binance.com:9443");
        assert_eq!(runtime.ping_interval, Duration::from_millis(5_000));
        assert_eq!(runtime.keepalive_interval, Duration::from_millis(600_000));
        assert_eq!(runtime.heartbeat.strategy, HeartbeatStrategy::ExpectedCount);
        runtime.validate().unwrap();
    }

    #[test]
    fn test_user_data_entry_with_inline_credentials() {
        let config = load_config_from_str(
            r#"{"connections": [{"name": "acct", "mode": "user_data", "heartbeat": "periodic",
                "api_key": "key", "secret_key": "secret"}]}"#,
        )
        .unwrap();
        let entry = &config.connections[0];
        let credentials = entry.credentials().unwrap();
        assert_eq!(credentials.as_ref().map(|c| c.api_key.as_str()), Some("key"));

        let runtime = entry.to_connection_config(credentials);
        assert!(runtime.is_user_data());
        assert_eq!(runtime.heartbeat.strategy, HeartbeatStrategy::Periodic);
        runtime.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let no_channels = load_config_from_str(
            r#"{"connections": [{"name": "t", "mode": "public_streams"}]}"#,
        )
        .unwrap();
        assert!(matches!(no_channels.validate(), Err(ConfigError::Invalid(_))));

        let duplicate = load_config_from_str(
            r#"{"connections": [
                {"name": "t", "mode": "public_streams", "channels": ["a"]},
                {"name": "t", "mode": "public_streams", "channels": ["b"]}]}"#,
        )
        .unwrap();
        assert!(matches!(duplicate.validate(), Err(ConfigError::Invalid(_))));

        let bad_scheme = load_config_from_str(
            r#"{"connections": [{"name": "t", "mode": "public_streams", "channels": ["a"],
                "base_url": "https://stream.binance.com"}]}"#,
        )
        .unwrap();
        assert!(matches!(bad_scheme.validate(), Err(ConfigError::Invalid(_))));

        let disabled = load_config_from_str(
            r#"{"connections": [{"name": "t", "mode": "public_streams", "channels": ["a"], "enabled": false}]}"#,
        )
        .unwrap();
        assert!(matches!(
            disabled.validate(),
            Err(ConfigError::NoEnabledConnections)
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            load_config_from_str("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
