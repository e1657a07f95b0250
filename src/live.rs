//! Live event-stream connection.
//!
//! [`connect`] performs the authenticated WebSocket handshake and spawns a
//! background loop that feeds every inbound frame to the
//! [`EventDispatcher`], reconnecting with exponential backoff when the
//! link drops. [`ConnectionHandle`] controls that loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_stream::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::auth::ApiKey;
use crate::dispatch::{EventDispatcher, EventFrame, REGISTER_EVENT, REQUEST_SNAPSHOT_EVENT};
use crate::error::ConnectError;
use crate::notice::{Notice, Notifier};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where and how to hold the event stream open.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use barangay_sync::{ApiKey, ConnectionConfig};
///
/// let config = ConnectionConfig {
///     url: "ws://hall.local:8080/events".into(),
///     api_key: ApiKey::fixed("secret"),
///     ..ConnectionConfig::default()
/// };
/// assert_eq!(config.reconnect_max_delay, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,

    /// Sent as a header on every handshake, including reconnects.
    pub api_key: ApiKey,

    /// Base delay for exponential backoff on reconnection.
    ///
    /// After a disconnect the loop waits `reconnect_base_delay`, then
    /// twice that, and so on up to
    /// [`reconnect_max_delay`](ConnectionConfig::reconnect_max_delay). A
    /// successful handshake resets the backoff.
    ///
    /// Default: 1 second.
    pub reconnect_base_delay: Duration,

    /// Maximum delay between reconnection attempts.
    ///
    /// Default: 30 seconds.
    pub reconnect_max_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            api_key: ApiKey::none(),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}

/// Connected / closing flags shared by the handle and the loop.
///
/// The lost-connection rule lives here so it can be tested without a
/// socket: only the transition from connected to disconnected reports, and
/// never once teardown has begun.
#[derive(Debug, Default)]
pub(crate) struct LinkState {
    connected: AtomicBool,
    is_closing_intentionally: AtomicBool,
}

impl LinkState {
    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Record a disconnect. Returns `true` if it should surface as
    /// [`Notice::ConnectionLost`].
    pub(crate) fn mark_disconnected(&self) -> bool {
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        was_connected && !self.is_closing()
    }

    pub(crate) fn begin_closing(&self) {
        self.is_closing_intentionally.store(true, Ordering::Release);
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.is_closing_intentionally.load(Ordering::Acquire)
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Handle for a running connection loop.
///
/// Dropping the handle stops the loop the same way
/// [`disconnect`](ConnectionHandle::disconnect) does, without waiting for
/// it to finish.
pub struct ConnectionHandle {
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    link: Arc<LinkState>,
    task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    /// Returns `true` while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Close the connection and wait for the loop to exit.
    ///
    /// No push events are applied to the store after this returns, and no
    /// [`Notice::ConnectionLost`] is raised for the teardown. Calling it
    /// more than once is safe.
    pub async fn disconnect(&self) {
        // The flag must be visible before the socket closes.
        self.link.begin_closing();
        let _ = self.shutdown_tx.send(true);

        let task = self.task.lock().await.take();
        if let Some(join_handle) = task
            && let Err(e) = join_handle.await
        {
            tracing::error!(error = %e, "connection loop task panicked");
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.link.begin_closing();
        let _ = self.shutdown_tx.send(true);
    }
}

/// Open the event stream and start the background loop.
///
/// Returns once the first handshake succeeds. The loop then sends
/// `register` and `getAllTransactions`, and does so again after every
/// reconnect so the store resynchronizes.
///
/// # Errors
///
/// [`ConnectError`] if the URL or auth header is invalid or the first
/// handshake fails. Later failures are retried in the background.
pub async fn connect(
    config: ConnectionConfig,
    dispatcher: EventDispatcher,
    notifier: Arc<dyn Notifier>,
) -> Result<ConnectionHandle, ConnectError> {
    let socket = open(&config).await?;
    tracing::info!(url = %config.url, "event stream connected");

    let link = Arc::new(LinkState::default());
    link.mark_connected();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(run_connection_loop(
        config,
        dispatcher,
        notifier,
        Some(socket),
        Arc::clone(&link),
        shutdown_rx,
    ));

    Ok(ConnectionHandle {
        shutdown_tx,
        link,
        task: tokio::sync::Mutex::new(Some(task)),
    })
}

async fn open(config: &ConnectionConfig) -> Result<Socket, ConnectError> {
    let mut request = config.url.as_str().into_client_request()?;
    config.api_key.apply(request.headers_mut())?;
    let (socket, response) = tokio_tungstenite::connect_async(request).await?;
    tracing::debug!(status = %response.status(), "handshake complete");
    Ok(socket)
}

/// Send the frames that follow every handshake.
pub(crate) async fn announce<S>(sink: &mut S) -> Result<(), ConnectError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let frames = [
        EventFrame::new(REGISTER_EVENT, json!({ "role": "admin" })),
        EventFrame::new(REQUEST_SNAPSHOT_EVENT, Value::Null),
    ];
    for frame in frames {
        let text = serde_json::to_string(&frame)?;
        sink.send(Message::Text(text))
            .await
            .map_err(ConnectError::Send)?;
    }
    Ok(())
}

/// Why a stream stopped yielding frames.
#[derive(Debug)]
pub(crate) enum StreamOutcome {
    /// The server sent a close frame or the stream reached EOF.
    Closed,
    /// The transport failed.
    Error(tungstenite::Error),
}

/// Dispatch frames until the stream closes or fails.
///
/// Generic over the stream so tests can feed canned messages.
pub(crate) async fn process_stream<S>(dispatcher: &EventDispatcher, mut stream: S) -> StreamOutcome
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                dispatcher.dispatch_frame(&text);
            }
            Ok(Message::Close(_)) => return StreamOutcome::Closed,
            Ok(Message::Binary(bytes)) => {
                tracing::debug!(len = bytes.len(), "ignoring binary frame");
            }
            // Ping/pong is answered by the transport.
            Ok(_) => {}
            Err(e) => return StreamOutcome::Error(e),
        }
    }
    StreamOutcome::Closed
}

/// Background loop owned by a [`ConnectionHandle`].
///
/// `socket` is the already-open first connection; later iterations open
/// their own.
async fn run_connection_loop(
    config: ConnectionConfig,
    dispatcher: EventDispatcher,
    notifier: Arc<dyn Notifier>,
    mut socket: Option<Socket>,
    link: Arc<LinkState>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    let mut backoff_delay = config.reconnect_base_delay;

    loop {
        if *shutdown_rx.borrow() || link.is_closing() {
            return;
        }

        let ws = match socket.take() {
            Some(ws) => ws,
            None => {
                tracing::info!(url = %config.url, "event stream: reconnecting");
                let attempt = tokio::select! {
                    attempt = open(&config) => attempt,
                    _ = shutdown_rx.changed() => return,
                };
                match attempt {
                    Ok(ws) => ws,
                    Err(e) => {
                        tracing::warn!(error = %e, "event stream: reconnect failed");
                        tokio::select! {
                            _ = tokio::time::sleep(backoff_delay) => {}
                            _ = shutdown_rx.changed() => return,
                        }
                        backoff_delay = (backoff_delay * 2).min(config.reconnect_max_delay);
                        continue;
                    }
                }
            }
        };
        link.mark_connected();
        backoff_delay = config.reconnect_base_delay;

        let (mut sink, stream) = futures_util::StreamExt::split(ws);

        let outcome = match announce(&mut sink).await {
            Ok(()) => {
                tokio::select! {
                    outcome = process_stream(&dispatcher, stream) => outcome,
                    _ = shutdown_rx.changed() => {
                        let _ = sink.close().await;
                        link.mark_disconnected();
                        tracing::info!("event stream closed");
                        return;
                    }
                }
            }
            Err(ConnectError::Send(e)) => StreamOutcome::Error(e),
            Err(e) => {
                // Encoding a fixed frame cannot recover by reconnecting.
                tracing::error!(error = %e, "event stream: announce failed");
                link.mark_disconnected();
                return;
            }
        };

        match &outcome {
            StreamOutcome::Closed => tracing::warn!("event stream: closed by server"),
            StreamOutcome::Error(e) => tracing::warn!(error = %e, "event stream: transport error"),
        }
        if link.mark_disconnected() {
            notifier.notify(Notice::ConnectionLost);
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff_delay) => {}
            _ = shutdown_rx.changed() => return,
        }
        backoff_delay = (backoff_delay * 2).min(config.reconnect_max_delay);
    }
}
