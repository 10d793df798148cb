//! Domain layer - connection model, events and the seams to the outside

pub mod config;
pub mod events;
pub mod state;
pub mod traits;

pub use config::{
    ConnectionConfig, Credentials, DEFAULT_BASE_URL, DEFAULT_KEEPALIVE_INTERVAL_MS,
    DEFAULT_PING_INTERVAL_MS, DEFAULT_REST_URL, HeartbeatSettings, HeartbeatStrategy, StreamMode,
    TerminateSink,
};
pub use events::{
    CloseReason, Effect, HeartbeatTimer, InboundFrame, OutboundFrame, SessionEvent, StreamPayload,
    TerminateCause, Termination, TimerKind,
};
pub use state::{ConnectionState, Phase};
pub use traits::{FnHandler, ListenKeyApi, LoggingHandler, StreamHandler};
