//! Heartbeat liveness loop
//!
//! Two alternating timers keyed off a monotonic pong counter:
//!
//! ```text
//!   start ──(initial_delay)──► Ping(1)
//!
//!   Ping(e):  count ≥ e ──(idle_poll)───► Ping(count+1)      peer already active
//!             count < e ──send ping, (pong_timeout)──► Pong(count+1)
//!
//!   Pong(e):  count ≥ e ──(idle_poll)───► Ping(count+1)
//!             count < e ──► liveness failure, loop stops
//! ```
//!
//! Timer delivery may be late under load; only the counter decides liveness.

use std::time::Duration;

use crate::domain::{HeartbeatSettings, HeartbeatStrategy, HeartbeatTimer};

/// What the session should do after a heartbeat timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStep {
    /// Arm the next timer, nothing to send
    Rearm {
        timer: HeartbeatTimer,
        after: Duration,
    },
    /// Send a protocol ping, then arm the next timer
    Ping {
        timer: HeartbeatTimer,
        after: Duration,
    },
    /// No pong arrived in time
    Failed { expected: u64, observed: u64 },
}

#[derive(Debug, Clone)]
pub struct HeartbeatLoop {
    settings: HeartbeatSettings,
    ping_interval: Duration,
    stopped: bool,
}

impl HeartbeatLoop {
    pub fn new(settings: HeartbeatSettings, ping_interval: Duration) -> Self {
        HeartbeatLoop {
            settings,
            ping_interval,
            stopped: false,
        }
    }

    /// First timer, armed when the socket opens
    pub fn start(&self) -> (HeartbeatTimer, Duration) {
        match self.settings.strategy {
            HeartbeatStrategy::ExpectedCount => (
                HeartbeatTimer::Ping { expected: 1 },
                self.settings.initial_delay,
            ),
            HeartbeatStrategy::Periodic => (HeartbeatTimer::Tick, self.ping_interval),
        }
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Advance on a fired timer. `None` once the loop has stopped.
    pub fn on_timer(&mut self, timer: HeartbeatTimer, heartbeat_count: u64) -> Option<HeartbeatStep> {
        if self.stopped {
            return None;
        }

        let step = match timer {
            HeartbeatTimer::Ping { expected } if heartbeat_count >= expected => {
                HeartbeatStep::Rearm {
                    timer: HeartbeatTimer::Ping {
                        expected: heartbeat_count + 1,
                    },
                    after: self.settings.idle_poll,
                }
            }
            HeartbeatTimer::Ping { .. } => HeartbeatStep::Ping {
                timer: HeartbeatTimer::Pong {
                    expected: heartbeat_count + 1,
                },
                after: self.settings.pong_timeout,
            },
            HeartbeatTimer::Pong { expected } if heartbeat_count >= expected => {
                HeartbeatStep::Rearm {
                    timer: HeartbeatTimer::Ping {
                        expected: heartbeat_count + 1,
                    },
                    after: self.settings.idle_poll,
                }
            }
            HeartbeatTimer::Pong { expected } => {
                self.stopped = true;
                HeartbeatStep::Failed {
                    expected,
                    observed: heartbeat_count,
                }
            }
            HeartbeatTimer::Tick => HeartbeatStep::Ping {
                timer: HeartbeatTimer::Tick,
                after: self.ping_interval,
            },
        };

        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_count_loop() -> HeartbeatLoop {
        HeartbeatLoop::new(HeartbeatSettings::default(), Duration::from_secs(5))
    }

    #[test]
    fn test_start_after_grace_period() {
        let hb = expected_count_loop();
        assert_eq!(
            hb.start(),
            (HeartbeatTimer::Ping { expected: 1 }, Duration::from_secs(20))
        );
    }

    #[test]
    fn test_ping_sent_when_peer_silent() {
        let mut hb = expected_count_loop();
        let step = hb.on_timer(HeartbeatTimer::Ping { expected: 1 }, 0);
        assert_eq!(
            step,
            Some(HeartbeatStep::Ping {
                timer: HeartbeatTimer::Pong { expected: 1 },
                after: Duration::from_secs(4),
            })
        );
    }

    #[test]
    fn test_ping_skipped_when_peer_active() {
        let mut hb = expected_count_loop();
        let step = hb.on_timer(HeartbeatTimer::Ping { expected: 1 }, 3);
        assert_eq!(
            step,
            Some(HeartbeatStep::Rearm {
                timer: HeartbeatTimer::Ping { expected: 4 },
                after: Duration::from_secs(1),
            })
        );
    }

    #[test]
    fn test_pong_answered() {
        let mut hb = expected_count_loop();
        let step = hb.on_timer(HeartbeatTimer::Pong { expected: 1 }, 1);
        assert_eq!(
            step,
            Some(HeartbeatStep::Rearm {
                timer: HeartbeatTimer::Ping { expected: 2 },
                after: Duration::from_secs(1),
            })
        );
        assert!(!hb.is_stopped());
    }

    #[test]
    fn test_pong_missing_fails_once() {
        let mut hb = expected_count_loop();
        let step = hb.on_timer(HeartbeatTimer::Pong { expected: 5 }, 4);
        assert_eq!(
            step,
            Some(HeartbeatStep::Failed {
                expected: 5,
                observed: 4
            })
        );
        assert!(hb.is_stopped());
        assert_eq!(hb.on_timer(HeartbeatTimer::Ping { expected: 5 }, 4), None);
    }

    #[test]
    fn test_periodic_strategy() {
        let settings = HeartbeatSettings::default().with_strategy(HeartbeatStrategy::Periodic);
        let mut hb = HeartbeatLoop::new(settings, Duration::from_millis(4_000));
        assert_eq!(hb.start(), (HeartbeatTimer::Tick, Duration::from_millis(4_000)));

        // no liveness detection: a silent peer still just gets pinged
        for _ in 0..3 {
            assert_eq!(
                hb.on_timer(HeartbeatTimer::Tick, 0),
                Some(HeartbeatStep::Ping {
                    timer: HeartbeatTimer::Tick,
                    after: Duration::from_millis(4_000),
                })
            );
        }
    }
}
