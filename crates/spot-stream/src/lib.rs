//! Spot Stream Crate
//!
//! Resilient WebSocket streaming client for the Binance Spot market-data
//! and user-data streams.
//!
//! # Architecture
//!
//! Each connection:
//! - Obtains a listen key over REST (user-data mode only) and keeps it alive
//! - Opens a single- or combined-stream WebSocket
//! - Decodes frames (JSON, raw-deflate compressed pong) and hands them to a
//!   user-supplied [`StreamHandler`]
//! - Tracks peer liveness with a ping/pong counter and closes on silence
//! - Reports how it ended through an optional termination sink
//!
//! ```text
//!            ┌───────────────┐  create / keepalive  ┌──────────────┐
//!            │  RestClient   │◄─────────────────────│              │
//!            └───────────────┘                      │              │
//!                                                   │  Connection  │
//! ┌──────────┐ frames  ┌──────────┐  SessionEvent   │    task      │
//! │ exchange │────────►│ WsClient │────────────────►│  (Session)   │
//! │  socket  │◄────────│ (writer) │◄────────────────│              │
//! └──────────┘         └──────────┘     Effect      └──────┬───────┘
//!                                                          │ hooks
//!                                                          ▼
//!                                                   ┌──────────────┐
//!                                                   │StreamHandler │
//!                                                   └──────────────┘
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-export key types
pub use domain::{
    ConnectionConfig, ConnectionState, Credentials, FnHandler, HeartbeatSettings,
    HeartbeatStrategy, InboundFrame, ListenKeyApi, LoggingHandler, OutboundFrame, Phase,
    StreamHandler, StreamMode, StreamPayload, TerminateCause, Termination,
};
pub use error::{DecodeError, RestError, StreamError};

pub use application::{
    ConnectionHandle, ConnectionRegistry, ConnectionSender, Session, StreamConnection,
};

pub use infrastructure::rest_client::RestClient;
pub use infrastructure::signer::{SignedRequest, sign};
pub use infrastructure::url::{combined_stream_url, connect_url, single_stream_url};

pub use config::{
    ConfigError, StreamConfigFile, load_config, load_default_config, resolve_credentials,
};
