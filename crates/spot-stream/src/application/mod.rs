//! Application layer - connection orchestration
//!
//! - Session: pure event -> effect state machine for one connection
//! - StreamConnection: tokio runtime executing session effects
//! - HeartbeatLoop / KeepaliveLoop: liveness and listen-key scheduling
//! - ConnectionRegistry: live connections by name

pub mod connection;
pub mod heartbeat;
pub mod keepalive;
pub mod registry;
pub mod session;

pub use connection::{ConnectionHandle, ConnectionSender, StreamConnection};
pub use heartbeat::{HeartbeatLoop, HeartbeatStep};
pub use keepalive::KeepaliveLoop;
pub use registry::ConnectionRegistry;
pub use session::Session;
