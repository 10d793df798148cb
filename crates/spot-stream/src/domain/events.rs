use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Frame received from the socket
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
    /// Protocol-level ping (answered by the transport)
    Ping(Vec<u8>),
    /// Protocol-level pong
    Pong(Vec<u8>),
}

/// Frame to write to the socket
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
    /// Protocol ping, empty payload
    Ping,
    Pong(Vec<u8>),
}

impl OutboundFrame {
    /// Serialize a value into a text frame
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(OutboundFrame::Text(serde_json::to_string(value)?))
    }
}

/// Decoded payload handed to `on_response`
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    Json(Value),
    /// Inflated text that is not JSON (the compressed pong inflates to `pong`)
    Text(String),
    /// Binary frame passed through unchanged
    Binary(Vec<u8>),
}

impl StreamPayload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            StreamPayload::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Why a connection ended, as reported to `catch_terminate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateCause {
    /// Close was requested locally through the connection handle
    NormalClose,
    /// Liveness failure, transport error, or server-initiated close
    AbnormalClose,
}

/// Termination notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub name: String,
    pub cause: TerminateCause,
}

/// Heartbeat loop timer events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTimer {
    Ping { expected: u64 },
    Pong { expected: u64 },
    /// Fixed-cadence ping (periodic strategy)
    Tick,
}

/// Timers the session can arm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Heartbeat(HeartbeatTimer),
    Keepalive,
}

/// Why the session asked for the socket to close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Requested,
    Liveness,
}

/// Mailbox events, served in order by the connection task
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// WebSocket handshake completed
    Opened,
    Frame(InboundFrame),
    Timer(TimerKind),
    /// User-initiated outbound frame
    Send(OutboundFrame),
    /// User-initiated close
    CloseRequested,
    /// Socket torn down; carries the transport error if there was one
    SocketClosed(Option<String>),
}

/// Side effects requested by the session, executed by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(OutboundFrame),
    Arm { timer: TimerKind, after: Duration },
    /// Renew the listen key through the REST collaborator
    RenewListenKey(String),
    /// Close the socket
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_frame() {
        let frame = OutboundFrame::json(&json!({"method": "LIST_SUBSCRIPTIONS", "id": 3})).unwrap();
        match frame {
            OutboundFrame::Text(text) => {
                assert!(text.contains("LIST_SUBSCRIPTIONS"));
                assert!(text.contains("\"id\":3"));
            }
            other => panic!("Expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_as_json() {
        let payload = StreamPayload::Json(json!({"e": "trade"}));
        assert_eq!(payload.as_json().unwrap()["e"], "trade");
        assert!(StreamPayload::Text("pong".into()).as_json().is_none());
    }
}
