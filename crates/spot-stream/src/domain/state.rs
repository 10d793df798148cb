/// Connection lifecycle phase. Ordered: `Connecting < Open < Closing < Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        *self == Phase::Closed
    }
}

/// Mutable per-connection state, owned exclusively by the session.
///
/// Hooks get a shared reference; only the session mutates it.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    name: String,
    heartbeat_count: u64,
    listen_key: Option<String>,
    phase: Phase,
    expected_heartbeat: u64,
}

impl ConnectionState {
    pub fn new(name: impl Into<String>) -> Self {
        ConnectionState {
            name: name.into(),
            heartbeat_count: 0,
            listen_key: None,
            phase: Phase::Connecting,
            expected_heartbeat: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeat_count
    }

    pub fn listen_key(&self) -> Option<&str> {
        self.listen_key.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Heartbeat value the liveness check is currently waiting for
    pub fn expected_heartbeat(&self) -> u64 {
        self.expected_heartbeat
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Count one pong. Returns the new count.
    pub(crate) fn record_heartbeat(&mut self) -> u64 {
        self.heartbeat_count += 1;
        self.heartbeat_count
    }

    pub(crate) fn set_expected_heartbeat(&mut self, expected: u64) {
        self.expected_heartbeat = expected;
    }

    /// `Connecting -> Open`. The listen key (user-data only) becomes visible here.
    pub(crate) fn open(&mut self, listen_key: Option<String>) -> bool {
        if self.phase != Phase::Connecting {
            return false;
        }
        self.phase = Phase::Open;
        self.listen_key = listen_key;
        true
    }

    /// Move to `Closing`. Returns false if a close is already underway.
    pub(crate) fn begin_close(&mut self) -> bool {
        if self.phase >= Phase::Closing {
            return false;
        }
        self.phase = Phase::Closing;
        true
    }

    /// Move to `Closed`. Returns false if already closed.
    pub(crate) fn close(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = Phase::Closed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::Connecting < Phase::Open);
        assert!(Phase::Open < Phase::Closing);
        assert!(Phase::Closing < Phase::Closed);
        assert!(Phase::Closed.is_terminal());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut state = ConnectionState::new("account");
        assert_eq!(state.phase(), Phase::Connecting);
        assert!(state.listen_key().is_none());

        assert!(state.open(Some("abc123".into())));
        assert_eq!(state.listen_key(), Some("abc123"));
        assert!(!state.open(Some("other".into())));
        assert_eq!(state.listen_key(), Some("abc123"));

        assert!(state.begin_close());
        assert!(!state.begin_close());
        assert!(state.close());
        assert!(!state.close());
        assert!(!state.begin_close());
        assert_eq!(state.phase(), Phase::Closed);
        // key survives into Closed
        assert_eq!(state.listen_key(), Some("abc123"));
    }

    #[test]
    fn test_heartbeat_counter() {
        let mut state = ConnectionState::new("depth");
        assert_eq!(state.record_heartbeat(), 1);
        assert_eq!(state.record_heartbeat(), 2);
        assert_eq!(state.heartbeat_count(), 2);
    }
}
