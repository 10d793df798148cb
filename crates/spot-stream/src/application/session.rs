//! Connection orchestrator state machine
//!
//! `Session` is the pure half of a connection: every mailbox event is turned
//! into a list of effects (frames to write, timers to arm, renewals, close)
//! that the runtime in [`super::connection`] executes. Keeping I/O out of this
//! type lets the whole lifecycle be driven with virtual time in tests.
//!
//! ```text
//! Connecting ──Opened──► Open ──close requested / liveness failure──► Closing
//!      │                  │                                              │
//!      └──────────────────┴──────────────SocketClosed────────────────────┴──► Closed
//! ```

use crate::domain::{
    CloseReason, ConnectionConfig, ConnectionState, Effect, HeartbeatTimer, InboundFrame,
    OutboundFrame, SessionEvent, StreamHandler, StreamMode, StreamPayload, TerminateCause,
    Termination, TimerKind,
};
use crate::error::StreamError;
use crate::infrastructure::codec::{self, Decoded};
use crate::infrastructure::url;

use super::heartbeat::{HeartbeatLoop, HeartbeatStep};
use super::keepalive::KeepaliveLoop;

pub struct Session<H: StreamHandler> {
    config: ConnectionConfig,
    state: ConnectionState,
    heartbeat: HeartbeatLoop,
    keepalive: Option<KeepaliveLoop>,
    /// Listen key obtained while connecting; moves into the state on open
    pending_listen_key: Option<String>,
    close_reason: Option<CloseReason>,
    termination: Option<TerminateCause>,
    handler: H,
}

impl<H: StreamHandler> Session<H> {
    /// Create a session in `Connecting`. User-data sessions need the listen key
    /// created by the REST side; public sessions must not carry one.
    pub fn new(
        config: ConnectionConfig,
        handler: H,
        listen_key: Option<String>,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        match (config.mode, &listen_key) {
            (StreamMode::UserData, None) => {
                return Err(StreamError::Config(format!(
                    "{}: user data session requires a listen key",
                    config.name
                )));
            }
            (StreamMode::PublicStreams, Some(_)) => {
                return Err(StreamError::Config(format!(
                    "{}: public session cannot carry a listen key",
                    config.name
                )));
            }
            _ => {}
        }

        Ok(Session {
            state: ConnectionState::new(config.name.clone()),
            heartbeat: HeartbeatLoop::new(config.heartbeat, config.ping_interval),
            keepalive: None,
            pending_listen_key: listen_key,
            close_reason: None,
            termination: None,
            handler,
            config,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Set once the session reaches `Closed`
    pub fn termination_cause(&self) -> Option<TerminateCause> {
        self.termination
    }

    /// URL to open for this session
    pub fn connect_url(&self) -> Result<String, StreamError> {
        let listen_key = self
            .pending_listen_key
            .as_deref()
            .or(self.state.listen_key());
        url::connect_url(&self.config, listen_key)
    }

    /// Process one mailbox event
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        if self.state.phase().is_terminal() {
            return Vec::new();
        }

        match event {
            SessionEvent::Opened => self.on_opened(),
            SessionEvent::Frame(frame) => self.on_frame(frame),
            SessionEvent::Timer(TimerKind::Heartbeat(timer)) => self.on_heartbeat(timer),
            SessionEvent::Timer(TimerKind::Keepalive) => self.on_keepalive(),
            SessionEvent::Send(frame) => self.on_send(frame),
            SessionEvent::CloseRequested => self.request_close(CloseReason::Requested),
            SessionEvent::SocketClosed(error) => self.on_socket_closed(error),
        }
    }

    fn on_opened(&mut self) -> Vec<Effect> {
        if !self.state.open(self.pending_listen_key.take()) {
            return Vec::new();
        }
        tracing::info!(connection = %self.config.name, mode = ?self.config.mode, "connected");

        let mut effects = Vec::new();
        if let Some(frame) = self.handler.on_connect(&self.state) {
            effects.push(Effect::Send(frame));
        }

        let (timer, after) = self.heartbeat.start();
        self.track_expected(timer);
        effects.push(Effect::Arm {
            timer: TimerKind::Heartbeat(timer),
            after,
        });

        if let Some(listen_key) = self.state.listen_key() {
            let keepalive = KeepaliveLoop::new(listen_key, self.config.keepalive_interval);
            effects.push(Effect::Arm {
                timer: TimerKind::Keepalive,
                after: keepalive.interval(),
            });
            self.keepalive = Some(keepalive);
        }

        effects
    }

    fn on_frame(&mut self, frame: InboundFrame) -> Vec<Effect> {
        if self.state.phase() < crate::domain::Phase::Open {
            tracing::warn!(connection = %self.config.name, "frame before open, dropped");
            return Vec::new();
        }

        match codec::decode(frame) {
            Ok(Decoded::Payload(payload)) => self.dispatch(payload),
            Ok(Decoded::CompressedPong(inflated)) => {
                let count = self.state.record_heartbeat();
                tracing::trace!(connection = %self.config.name, count, "compressed pong");
                match inflated {
                    Ok(payload) => self.dispatch(payload),
                    Err(e) => {
                        tracing::warn!(connection = %self.config.name, "{}", StreamError::from(e));
                        Vec::new()
                    }
                }
            }
            Ok(Decoded::Pong) => {
                let count = self.state.record_heartbeat();
                tracing::trace!(connection = %self.config.name, count, "pong");
                Vec::new()
            }
            Ok(Decoded::Ping) => {
                tracing::trace!(connection = %self.config.name, "ping");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(connection = %self.config.name, "{}", StreamError::from(e));
                Vec::new()
            }
        }
    }

    fn dispatch(&mut self, payload: StreamPayload) -> Vec<Effect> {
        let reply = self.handler.on_response(payload, &self.state);
        match reply {
            Some(frame) if self.state.is_open() => vec![Effect::Send(frame)],
            Some(_) => {
                tracing::debug!(connection = %self.config.name, "reply dropped while closing");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn on_heartbeat(&mut self, timer: HeartbeatTimer) -> Vec<Effect> {
        if !self.state.is_open() {
            return Vec::new();
        }

        match self.heartbeat.on_timer(timer, self.state.heartbeat_count()) {
            None => Vec::new(),
            Some(HeartbeatStep::Rearm { timer, after }) => {
                self.track_expected(timer);
                vec![Effect::Arm {
                    timer: TimerKind::Heartbeat(timer),
                    after,
                }]
            }
            Some(HeartbeatStep::Ping { timer, after }) => {
                self.track_expected(timer);
                tracing::trace!(connection = %self.config.name, "sending ping");
                vec![
                    Effect::Send(OutboundFrame::Ping),
                    Effect::Arm {
                        timer: TimerKind::Heartbeat(timer),
                        after,
                    },
                ]
            }
            Some(HeartbeatStep::Failed { expected, observed }) => {
                let err = StreamError::Liveness { expected, observed };
                tracing::error!(connection = %self.config.name, "{}", err);
                self.request_close(CloseReason::Liveness)
            }
        }
    }

    fn track_expected(&mut self, timer: HeartbeatTimer) {
        if let HeartbeatTimer::Ping { expected } | HeartbeatTimer::Pong { expected } = timer {
            self.state.set_expected_heartbeat(expected);
        }
    }

    fn on_keepalive(&mut self) -> Vec<Effect> {
        if !self.state.is_open() {
            return Vec::new();
        }
        let Some(keepalive) = self.keepalive.as_mut() else {
            return Vec::new();
        };

        let (listen_key, after) = keepalive.on_fire();
        vec![
            Effect::RenewListenKey(listen_key),
            Effect::Arm {
                timer: TimerKind::Keepalive,
                after,
            },
        ]
    }

    fn on_send(&mut self, frame: OutboundFrame) -> Vec<Effect> {
        if !self.state.is_open() {
            tracing::warn!(
                connection = %self.config.name,
                phase = ?self.state.phase(),
                "connection not open, outbound frame dropped"
            );
            return Vec::new();
        }
        vec![Effect::Send(frame)]
    }

    fn request_close(&mut self, reason: CloseReason) -> Vec<Effect> {
        if !self.state.begin_close() {
            return Vec::new();
        }
        tracing::debug!(connection = %self.config.name, ?reason, "closing");
        self.close_reason = Some(reason);
        self.heartbeat.stop();
        vec![Effect::Close]
    }

    fn on_socket_closed(&mut self, error: Option<String>) -> Vec<Effect> {
        if !self.state.close() {
            return Vec::new();
        }
        self.heartbeat.stop();

        if let Some(e) = error {
            tracing::warn!(connection = %self.config.name, "{}", StreamError::Transport(e));
        }

        let cause = match self.close_reason {
            Some(CloseReason::Requested) => TerminateCause::NormalClose,
            _ => TerminateCause::AbnormalClose,
        };
        self.termination = Some(cause);

        tracing::info!(
            connection = %self.config.name,
            ?cause,
            heartbeats = self.state.heartbeat_count(),
            "disconnected"
        );
        self.handler.on_disconnect(&self.state);
        self.handler.on_terminate(cause, &self.state);

        if let Some(sink) = &self.config.catch_terminate {
            let notice = Termination {
                name: self.config.name.clone(),
                cause,
            };
            if sink.send(notice).is_err() {
                tracing::debug!(connection = %self.config.name, "terminate sink dropped");
            }
        }

        Vec::new()
    }
}
