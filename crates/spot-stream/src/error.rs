//! Error types for the stream client
//!
//! `StreamError` is the connection-level taxonomy. `RestError` and
//! `DecodeError` are raised by the REST collaborator and the frame codec and
//! are either recovered locally (logged) or lifted into `StreamError`.

use thiserror::Error;

/// REST collaborator errors (listen-key lifecycle, signed endpoints)
#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {code} - {msg}")]
    Api { code: i32, msg: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Frame decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to inflate compressed frame: {0}")]
    Inflate(#[from] std::io::Error),
}

/// Connection-level errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Invalid connection configuration (empty channel list, missing credentials, bad URL)
    #[error("configuration error: {0}")]
    Config(String),

    /// Listen key could not be created at startup
    #[error("listen key creation failed: {0}")]
    Auth(#[source] RestError),

    /// Keepalive / close REST failure
    #[error("REST error: {0}")]
    Rest(#[from] RestError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Peer stopped answering pings
    #[error("liveness check failed: expected heartbeat {expected}, observed {observed}")]
    Liveness { expected: u64, observed: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

impl StreamError {
    /// Whether the error invalidates the session (as opposed to being retried on a later tick)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StreamError::Rest(_) | StreamError::Decode(_))
    }
}
