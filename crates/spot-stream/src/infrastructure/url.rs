use crate::domain::{ConnectionConfig, StreamMode};
use crate::error::StreamError;

/// `{base}/ws/{token}` for a listen key or a single channel
pub fn single_stream_url(base: &str, token: &str) -> String {
    format!("{}/ws/{}", base.trim_end_matches('/'), token)
}

/// `{base}/stream?streams=c1/c2/...`, input order, no URL-encoding
pub fn combined_stream_url<S: AsRef<str>>(base: &str, channels: &[S]) -> String {
    let streams: Vec<&str> = channels.iter().map(AsRef::as_ref).collect();
    format!(
        "{}/stream?streams={}",
        base.trim_end_matches('/'),
        streams.join("/")
    )
}

/// Build the connect URL for a connection
///
/// Public mode uses the single-stream shape for one channel and the combined
/// shape otherwise. User-data mode needs the listen key obtained at startup.
pub fn connect_url(
    config: &ConnectionConfig,
    listen_key: Option<&str>,
) -> Result<String, StreamError> {
    match config.mode {
        StreamMode::PublicStreams => match config.public_channels.as_slice() {
            [] => Err(StreamError::Config(format!(
                "{}: cannot build URL without channels",
                config.name
            ))),
            [channel] => Ok(single_stream_url(&config.base_url, channel)),
            channels => Ok(combined_stream_url(&config.base_url, channels)),
        },
        StreamMode::UserData => listen_key
            .map(|key| single_stream_url(&config.base_url, key))
            .ok_or_else(|| {
                StreamError::Config(format!("{}: user data stream without listen key", config.name))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Credentials;

    #[test]
    fn test_single_channel() {
        let config =
            ConnectionConfig::public_streams("depth", ["btcusdt@depth"]).with_base_url("wss://example");
        assert_eq!(
            connect_url(&config, None).unwrap(),
            "wss://example/ws/btcusdt@depth"
        );
    }

    #[test]
    fn test_multiple_channels() {
        let config = ConnectionConfig::public_streams("multi", ["btcusdt@depth", "ethusdt@trade"])
            .with_base_url("wss://example");
        assert_eq!(
            connect_url(&config, None).unwrap(),
            "wss://example/stream?streams=btcusdt@depth/ethusdt@trade"
        );
    }

    #[test]
    fn test_user_data_uses_listen_key() {
        let config = ConnectionConfig::user_data("account", Credentials::new("key", "secret"))
            .with_base_url("wss://example/");
        assert_eq!(
            connect_url(&config, Some("abc123")).unwrap(),
            "wss://example/ws/abc123"
        );
        assert!(matches!(
            connect_url(&config, None),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn test_empty_channels_rejected() {
        let config = ConnectionConfig::public_streams("none", Vec::<String>::new());
        assert!(matches!(
            connect_url(&config, None),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn test_combined_url_parses_back_in_order() {
        let channels = ["btcusdt@depth", "ethusdt@trade", "bnbusdt@kline_1m"];
        let url = combined_stream_url("wss://stream.binance.com:9443", &channels);

        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/stream");
        let query = parsed.query().unwrap();
        let streams = query.strip_prefix("streams=").unwrap();
        let parsed_channels: Vec<&str> = streams.split('/').collect();
        assert_eq!(parsed_channels, channels);
    }
}
