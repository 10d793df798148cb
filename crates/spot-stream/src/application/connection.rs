//! Connection runtime
//!
//! One tokio task per connection serves the session mailbox. Socket frames,
//! timer expiries, user sends and close requests all arrive through the same
//! channel, so the session never sees two events at once.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{
    ConnectionConfig, Effect, ListenKeyApi, OutboundFrame, SessionEvent, StreamHandler,
    TerminateCause, TimerKind,
};
use crate::error::StreamError;
use crate::infrastructure::{WsClient, WsWriter};

use super::keepalive;
use super::session::Session;

const MAILBOX_CAPACITY: usize = 1024;

/// Entry point for opening streaming connections
pub struct StreamConnection;

impl StreamConnection {
    /// Validate the config, create the listen key (user-data mode), open the
    /// socket and spawn the connection task.
    ///
    /// Nothing is retried here: a failed listen-key creation surfaces as
    /// [`StreamError::Auth`] and a failed handshake as [`StreamError::Transport`].
    pub async fn start<H, A>(
        config: ConnectionConfig,
        handler: H,
        api: Arc<A>,
    ) -> Result<ConnectionHandle, StreamError>
    where
        H: StreamHandler,
        A: ListenKeyApi + ?Sized + 'static,
    {
        config.validate()?;

        let listen_key = match (&config.credentials, config.is_user_data()) {
            (Some(credentials), true) => {
                let key = api.create(credentials).await.map_err(|e| {
                    tracing::error!(connection = %config.name, "listen key creation failed: {}", e);
                    StreamError::Auth(e)
                })?;
                tracing::info!(connection = %config.name, "listen key created");
                Some(key)
            }
            _ => None,
        };

        let name = config.name.clone();
        let session = Session::new(config, handler, listen_key.clone())?;
        let url = session.connect_url()?;

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let client = WsClient::new(url);
        tracing::debug!(connection = %name, url = client.url(), "connecting");
        let (writer, reader) = client.connect(tx.clone()).await.map_err(|e| {
            tracing::error!(connection = %name, "connect failed: {}", e);
            e
        })?;

        let runtime = Runtime {
            session,
            writer,
            reader,
            mailbox: rx,
            tasks: TaskSet::new(tx.clone()),
            api,
        };
        let task = tokio::spawn(runtime.run());

        Ok(ConnectionHandle {
            sender: ConnectionSender::new(name, tx),
            listen_key,
            task,
        })
    }
}

/// Owned handle to a running connection
pub struct ConnectionHandle {
    sender: ConnectionSender,
    listen_key: Option<String>,
    task: JoinHandle<TerminateCause>,
}

impl ConnectionHandle {
    pub fn name(&self) -> &str {
        self.sender.name()
    }

    /// Listen key the connection was opened with (user-data mode only)
    pub fn listen_key(&self) -> Option<&str> {
        self.listen_key.as_deref()
    }

    /// Cloneable sender for use from other tasks
    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    pub async fn send(&self, frame: OutboundFrame) -> Result<(), StreamError> {
        self.sender.send(frame).await
    }

    /// Request a normal close; the task finishes once the socket is down
    pub async fn close(&self) {
        self.sender.close().await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the connection task to end
    pub async fn wait(self) -> TerminateCause {
        match self.task.await {
            Ok(cause) => cause,
            Err(e) => {
                tracing::error!(connection = %self.sender.name, "connection task failed: {}", e);
                TerminateCause::AbnormalClose
            }
        }
    }
}

/// Mailbox sender for a connection
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    name: String,
    tx: mpsc::Sender<SessionEvent>,
}

impl ConnectionSender {
    pub(crate) fn new(name: impl Into<String>, tx: mpsc::Sender<SessionEvent>) -> Self {
        ConnectionSender {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue an outbound frame. Frames sent while the connection is not open
    /// are dropped by the session.
    pub async fn send(&self, frame: OutboundFrame) -> Result<(), StreamError> {
        self.tx
            .send(SessionEvent::Send(frame))
            .await
            .map_err(|_| StreamError::Transport(format!("{}: connection closed", self.name)))
    }

    /// Request a normal close. No-op if the connection already ended.
    pub async fn close(&self) {
        if self.tx.send(SessionEvent::CloseRequested).await.is_err() {
            tracing::debug!(connection = %self.name, "close requested on finished connection");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Background work owned by a connection: armed timers, each a sleeping task
/// that posts back into the mailbox, and in-flight listen-key renewals.
/// Everything is aborted when the connection ends.
struct TaskSet {
    tx: mpsc::Sender<SessionEvent>,
    handles: Vec<JoinHandle<()>>,
}

impl TaskSet {
    fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        TaskSet {
            tx,
            handles: Vec::new(),
        }
    }

    fn arm(&mut self, timer: TimerKind, after: Duration) {
        let tx = self.tx.clone();
        self.spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(SessionEvent::Timer(timer)).await;
        });
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());
        self.handles.push(tokio::spawn(task));
    }

    fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

struct Runtime<H: StreamHandler, A: ListenKeyApi + ?Sized> {
    session: Session<H>,
    writer: WsWriter,
    reader: JoinHandle<()>,
    mailbox: mpsc::Receiver<SessionEvent>,
    tasks: TaskSet,
    api: Arc<A>,
}

impl<H, A> Runtime<H, A>
where
    H: StreamHandler,
    A: ListenKeyApi + ?Sized + 'static,
{
    async fn run(mut self) -> TerminateCause {
        // events raised by effects jump ahead of the mailbox
        let mut local = VecDeque::from([SessionEvent::Opened]);

        while !self.session.state().phase().is_terminal() {
            let event = match local.pop_front() {
                Some(event) => event,
                None => match self.mailbox.recv().await {
                    Some(event) => event,
                    None => SessionEvent::SocketClosed(None),
                },
            };

            for effect in self.session.handle(event) {
                if let Some(follow_up) = self.execute(effect).await {
                    local.push_back(follow_up);
                    break;
                }
            }
        }

        self.tasks.abort_all();
        self.reader.abort();

        self.session
            .termination_cause()
            .unwrap_or(TerminateCause::AbnormalClose)
    }

    /// Run one effect. Returns an event to feed back when the socket went away.
    async fn execute(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::Send(frame) => match self.writer.send(frame).await {
                Ok(()) => None,
                Err(e) => Some(SessionEvent::SocketClosed(Some(e.to_string()))),
            },
            Effect::Arm { timer, after } => {
                self.tasks.arm(timer, after);
                None
            }
            Effect::RenewListenKey(listen_key) => {
                let config = self.session.config();
                match config.credentials.clone() {
                    Some(credentials) => {
                        self.tasks.spawn(keepalive::renew(
                            Arc::clone(&self.api),
                            config.name.clone(),
                            listen_key,
                            credentials,
                        ));
                    }
                    None => {
                        tracing::warn!(connection = %config.name, "no credentials for keepalive")
                    }
                }
                None
            }
            Effect::Close => {
                self.writer.close().await;
                Some(SessionEvent::SocketClosed(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Credentials;
    use crate::error::RestError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Keepalive calls that take far longer than the test runs
    #[derive(Default)]
    struct SlowApi {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl ListenKeyApi for SlowApi {
        async fn create(&self, _credentials: &Credentials) -> Result<String, RestError> {
            Ok("abc123".into())
        }

        async fn keepalive(
            &self,
            _listen_key: &str,
            _credentials: &Credentials,
        ) -> Result<(), RestError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self, _listen_key: &str, _credentials: &Credentials) -> Result<(), RestError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_all_cancels_renewals_and_timers() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut tasks = TaskSet::new(tx);
        let api = Arc::new(SlowApi::default());

        tasks.arm(TimerKind::Keepalive, Duration::from_secs(10));
        tasks.spawn(keepalive::renew(
            Arc::clone(&api),
            "account".into(),
            "abc123".into(),
            Credentials::new("key", "secret"),
        ));
        tokio::task::yield_now().await;
        assert_eq!(api.started.load(Ordering::SeqCst), 1);

        tasks.abort_all();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(api.finished.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_posts_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut tasks = TaskSet::new(tx);

        tasks.arm(TimerKind::Keepalive, Duration::from_secs(10));
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Timer(TimerKind::Keepalive))
        );
    }
}
