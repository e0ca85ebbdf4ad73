//! WebSocket plumbing shared by both transport variants.
//!
//! The send half sits behind an async mutex used by the frame producer and
//! the keepalive pinger. The receive half is owned by a reader task that
//! drains the socket continuously, so pongs and control frames are seen even
//! while the event consumer is busy playing audio; data frames are queued
//! for [`WsConnection::next_message`]. The keepalive declares the connection
//! dead when nothing has been read for too long.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::WireMessage;
use crate::error::{SessionError, SessionResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Inbound = SessionResult<WireMessage>;

/// Ping cadence and dead-peer detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Build the upgrade request for `url` with extra headers.
///
/// Fails with a configuration error for a malformed endpoint or a header
/// value that cannot be sent.
pub fn client_request(url: &str, headers: &[(&'static str, String)]) -> SessionResult<Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| SessionError::Config(format!("invalid endpoint {}: {}", redact(url), e)))?;

    for (name, value) in headers {
        let value = HeaderValue::from_str(value)
            .map_err(|e| SessionError::Config(format!("invalid {} header: {}", name, e)))?;
        request.headers_mut().insert(*name, value);
    }

    Ok(request)
}

pub struct WsConnection {
    url: String,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    dead: CancellationToken,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
    keepalive_task: StdMutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WsConnection {
    /// Open a connection from a prepared request
    pub async fn connect(request: Request, keepalive: Keepalive) -> SessionResult<Self> {
        let url = request.uri().to_string();
        info!("Connecting to {}", redact(&url));

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| SessionError::Transport(format!("failed to connect: {}", e)))?;

        info!("Connected to {}", redact(&url));

        let (sink, stream) = ws.split();
        let sink = Arc::new(Mutex::new(sink));
        let last_seen = Arc::new(StdMutex::new(Instant::now()));
        let dead = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(Self::reader_task(
            stream,
            inbound_tx,
            Arc::clone(&last_seen),
            dead.clone(),
        ));

        // A zero interval disables keepalive
        let keepalive_task = (!keepalive.interval.is_zero()).then(|| {
            tokio::spawn(Self::keepalive_task(
                Arc::clone(&sink),
                last_seen,
                dead.clone(),
                keepalive,
            ))
        });

        Ok(Self {
            url,
            sink,
            inbound: Mutex::new(inbound_rx),
            dead,
            reader_task: StdMutex::new(Some(reader_task)),
            keepalive_task: StdMutex::new(keepalive_task),
            closed: AtomicBool::new(false),
        })
    }

    /// Drain the socket, stamping `last_seen` on every frame. Data frames are
    /// queued without waiting on the consumer; the channel closes when the
    /// peer goes away.
    async fn reader_task(
        mut stream: SplitStream<WsStream>,
        inbound: mpsc::UnboundedSender<Inbound>,
        last_seen: Arc<StdMutex<Instant>>,
        dead: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                _ = dead.cancelled() => return,
                next = stream.next() => next,
            };

            if let Ok(mut seen) = last_seen.lock() {
                *seen = Instant::now();
            }

            let message = match next {
                Some(Ok(Message::Text(text))) => Ok(WireMessage::Text(text)),
                Some(Ok(Message::Binary(bytes))) => Ok(WireMessage::Binary(bytes)),
                Some(Ok(Message::Close(frame))) => {
                    info!("Peer closed connection: {:?}", frame);
                    return;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => Err(SessionError::Transport(format!("receive failed: {}", e))),
                None => return,
            };

            let failed = message.is_err();
            if inbound.send(message).is_err() || failed {
                return;
            }
        }
    }

    async fn keepalive_task(
        sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
        last_seen: Arc<StdMutex<Instant>>,
        dead: CancellationToken,
        keepalive: Keepalive,
    ) {
        let mut ticker = tokio::time::interval(keepalive.interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let silent_for = last_seen
                .lock()
                .map(|seen| seen.elapsed())
                .unwrap_or_default();
            if silent_for > keepalive.interval + keepalive.timeout {
                warn!("No traffic for {:?}; keepalive expired", silent_for);
                dead.cancel();
                return;
            }

            if let Err(e) = sink.lock().await.send(Message::Ping(Vec::new())).await {
                warn!("Keepalive ping failed: {}", e);
                dead.cancel();
                return;
            }
        }
    }

    pub async fn send_text(&self, text: String) -> SessionResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("connection closed".to_string()));
        }

        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| SessionError::Transport(format!("send failed: {}", e)))
    }

    /// Next data frame; `Ok(None)` on orderly closure by the peer.
    ///
    /// Frames read before the keepalive expired are still delivered first.
    pub async fn next_message(&self) -> SessionResult<Option<WireMessage>> {
        let mut inbound = self.inbound.lock().await;

        tokio::select! {
            biased;
            next = inbound.recv() => match next {
                Some(message) => message.map(Some),
                None if self.dead.is_cancelled() => Err(keepalive_expired()),
                None => Ok(None),
            },
            _ = self.dead.cancelled() => Err(keepalive_expired()),
        }
    }

    /// Send a close frame and stop the background tasks. Idempotent.
    pub async fn close(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        abort(&self.keepalive_task);

        // The peer may already be gone; a failed close is not an error
        if let Err(e) = self.sink.lock().await.close().await {
            debug!("Close handshake with {} failed: {}", redact(&self.url), e);
        }

        abort(&self.reader_task);
        info!("Connection to {} closed", redact(&self.url));

        Ok(())
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        abort(&self.keepalive_task);
        abort(&self.reader_task);
    }
}

fn abort(task: &StdMutex<Option<JoinHandle<()>>>) {
    if let Ok(mut task) = task.lock() {
        if let Some(task) = task.take() {
            task.abort();
        }
    }
}

fn keepalive_expired() -> SessionError {
    SessionError::Transport("keepalive timeout".to_string())
}

/// Strip the query string so credentials in URLs never reach the logs
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
