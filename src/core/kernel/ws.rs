use crate::core::errors::TransportError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type ReplySender = oneshot::Sender<Result<WsResponse, TransportError>>;

/// Inbound WS-RPC envelope, matched back to its caller by `id`.
///
/// `result`/`error` are left as raw JSON; decoding them belongs to the
/// endpoint layer.
#[derive(Debug, Clone, Deserialize)]
pub struct WsResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Correlation registry shared between issuing callers and the reader task.
///
/// Callers insert on dispatch and delete on every exit path; the reader takes
/// an entry to deliver its reply. A lookup that loses the race with a
/// deletion finds nothing and the frame is dropped, which is safe by design.
struct CallRegistry {
    state: Mutex<RegistryState>,
}

struct RegistryState {
    pending: HashMap<String, ReplySender>,
    closed: bool,
}

impl CallRegistry {
    fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                pending: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn register(&self, id: String) -> Result<oneshot::Receiver<Result<WsResponse, TransportError>>, TransportError> {
        let mut state = self.state.lock().expect("registry lock poisoned");
        if state.closed {
            return Err(TransportError::SessionClosed);
        }
        let (tx, rx) = oneshot::channel();
        state.pending.insert(id, tx);
        Ok(rx)
    }

    /// Idempotent removal; called unconditionally on every caller exit path.
    fn deregister(&self, id: &str) {
        let mut state = self.state.lock().expect("registry lock poisoned");
        state.pending.remove(id);
    }

    /// Deliver a reply to the caller registered for `id`, if any. Each caller
    /// has its own single-slot channel, so delivery never blocks on other
    /// pending calls. Returns false when nobody is waiting.
    fn complete(&self, id: &str, response: WsResponse) -> bool {
        let sender = {
            let mut state = self.state.lock().expect("registry lock poisoned");
            state.pending.remove(id)
        };
        match sender {
            // A send error means the caller already gave up (cancelled between
            // lookup and delivery); the frame is dropped.
            Some(tx) => tx.send(Ok(response)).is_ok(),
            None => false,
        }
    }

    /// Terminal shutdown: refuse new registrations and fail every waiter with
    /// `SessionClosed` instead of leaving them to hang until their own
    /// timeouts fire.
    fn close(&self) {
        let drained: Vec<ReplySender> = {
            let mut state = self.state.lock().expect("registry lock poisoned");
            state.closed = true;
            state.pending.drain().map(|(_, tx)| tx).collect()
        };
        for tx in drained {
            let _ = tx.send(Err(TransportError::SessionClosed));
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().expect("registry lock poisoned").closed
    }

    fn len(&self) -> usize {
        self.state.lock().expect("registry lock poisoned").pending.len()
    }
}

/// One persistent WebSocket connection shared by many logical callers.
///
/// Exactly one background reader task demultiplexes inbound frames by
/// correlation identifier. The session is terminal on read error or remote
/// close: it never reconnects, and on shutdown every outstanding caller is
/// failed with [`TransportError::SessionClosed`].
pub struct WsSession {
    writer: tokio::sync::Mutex<WsSink>,
    registry: CallRegistry,
}

impl std::fmt::Debug for WsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession")
            .field("pending_calls", &self.pending_calls())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WsSession {
    /// Dial the endpoint and start the reader task.
    #[instrument(skip(url), fields(url = %url.as_ref()))]
    pub async fn connect(url: impl AsRef<str>) -> Result<Arc<Self>, TransportError> {
        let (stream, _) = connect_async(url.as_ref())
            .await
            .map_err(|e| TransportError::Network(format!("websocket dial failed: {e}")))?;
        let (write, read) = stream.split();

        let session = Arc::new(Self {
            writer: tokio::sync::Mutex::new(write),
            registry: CallRegistry::new(),
        });
        tokio::spawn(read_loop(Arc::clone(&session), read));
        Ok(session)
    }

    /// Register a waiter for a correlation identifier. Fails once the session
    /// is closed so callers do not enqueue work that can never complete.
    pub(crate) fn register(
        &self,
        id: String,
    ) -> Result<oneshot::Receiver<Result<WsResponse, TransportError>>, TransportError> {
        self.registry.register(id)
    }

    /// Idempotent removal of a waiter.
    pub(crate) fn deregister(&self, id: &str) {
        self.registry.deregister(id);
    }

    /// Write one frame. Writes from concurrent callers are serialized through
    /// the sink lock.
    pub(crate) async fn send(&self, message: Message) -> Result<(), TransportError> {
        if self.registry.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer
            .send(message)
            .await
            .map_err(|e| TransportError::Network(format!("websocket write failed: {e}")))
    }

    /// Number of calls currently awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.registry.len()
    }

    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Initiate a close handshake and fail all outstanding callers.
    pub async fn close(&self) {
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.send(Message::Close(None)).await;
        }
        self.registry.close();
    }

    fn dispatch(&self, text: &str) {
        let response: WsResponse = match serde_json::from_str(text) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };
        let Some(id) = response.id.clone() else {
            debug!("dropping frame without correlation id");
            return;
        };
        if !self.registry.complete(&id, response) {
            // Reply for an identifier nobody is waiting on, e.g. after the
            // caller cancelled. Dropped, not escalated.
            debug!(id = %id, "dropping frame for unknown correlation id");
        }
    }
}

/// The single background reader. Runs for the life of the connection; on read
/// error or remote close it shuts the registry down and exits.
async fn read_loop(session: Arc<WsSession>, mut read: WsSource) {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => session.dispatch(&text),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => session.dispatch(text),
                Err(e) => warn!(error = %e, "dropping non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Ping(data))) => {
                // Answered at transport level, like any control frame.
                let mut writer = session.writer.lock().await;
                if let Err(e) = writer.send(Message::Pong(data)).await {
                    warn!(error = %e, "failed to answer ping");
                }
            }
            Some(Ok(Message::Close(_))) => {
                debug!("close frame received");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "websocket read failed, terminating session");
                break;
            }
            None => {
                debug!("websocket stream ended");
                break;
            }
        }
    }
    session.registry.close();
}
