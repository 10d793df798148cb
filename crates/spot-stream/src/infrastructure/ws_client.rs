use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::codec;
use crate::domain::{OutboundFrame, SessionEvent};
use crate::error::StreamError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a close handshake may take before the socket is dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a frame write may stall before the socket counts as dead
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket client for the streaming gateway
/// Infrastructure component - handles WebSocket communication
pub struct WsClient {
    url: String,
}

impl WsClient {
    pub fn new(url: String) -> Self {
        WsClient { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and spawn a reader that forwards frames into `events`.
    ///
    /// The reader posts exactly one `SocketClosed` when the stream ends.
    pub async fn connect(
        &self,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<(WsWriter, JoinHandle<()>), StreamError> {
        let (ws_stream, _) = connect_async(&self.url).await?;
        let (write, read) = ws_stream.split();

        let reader = tokio::spawn(read_loop(read, events));

        let writer = WsWriter {
            sink: write,
            write_timeout: WRITE_TIMEOUT,
        };
        Ok((writer, reader))
    }
}

async fn read_loop(mut read: SplitStream<Socket>, events: mpsc::Sender<SessionEvent>) {
    let closed = loop {
        match read.next().await {
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(?frame, "close frame received");
                break SessionEvent::SocketClosed(None);
            }
            Some(Ok(message)) => {
                let Some(frame) = codec::from_message(message) else {
                    continue;
                };
                if events.send(SessionEvent::Frame(frame)).await.is_err() {
                    return;
                }
            }
            Some(Err(e)) => break SessionEvent::SocketClosed(Some(e.to_string())),
            None => break SessionEvent::SocketClosed(None),
        }
    };

    let _ = events.send(closed).await;
}

/// Write half of the socket
pub struct WsWriter {
    sink: SplitSink<Socket, Message>,
    write_timeout: Duration,
}

impl WsWriter {
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Write one frame. A write that stalls past the write timeout fails with
    /// a transport error.
    pub async fn send(&mut self, frame: OutboundFrame) -> Result<(), StreamError> {
        match tokio::time::timeout(self.write_timeout, self.sink.send(codec::to_message(frame)))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(StreamError::Transport(format!(
                "write stalled for {}ms",
                self.write_timeout.as_millis()
            ))),
        }
    }

    /// Best-effort close handshake; gives up after a short timeout
    pub async fn close(&mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.sink.send(Message::Close(None))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("close frame not sent: {}", e),
            Err(_) => tracing::debug!("close frame timed out"),
        }
    }
}
