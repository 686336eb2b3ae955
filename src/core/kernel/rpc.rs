use crate::core::errors::TransportError;
use crate::core::kernel::params::Request;
use crate::core::kernel::signer::Credentials;
use crate::core::kernel::timestamp_ms;
use crate::core::kernel::ws::{WsResponse, WsSession};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::instrument;
use uuid::Uuid;

/// Per-call entry point for WS-RPC endpoints.
///
/// Attaches credentials, signature and timestamp to a logical request,
/// registers a waiter on the shared [`WsSession`], writes the frame and
/// suspends until the correlated reply arrives. Cancellation is caller-local:
/// dropping the call future (e.g. via `tokio::time::timeout`) unregisters
/// only that call and leaves the socket, the reader and other pending calls
/// untouched.
pub struct RpcClient {
    session: Arc<WsSession>,
    credentials: Option<Arc<Credentials>>,
    recv_window_ms: u64,
    time_offset_ms: i64,
}

impl RpcClient {
    pub fn new(session: Arc<WsSession>, credentials: Option<Arc<Credentials>>) -> Self {
        Self {
            session,
            credentials,
            recv_window_ms: 5_000,
            time_offset_ms: 0,
        }
    }

    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    pub fn with_time_offset(mut self, time_offset_ms: i64) -> Self {
        self.time_offset_ms = time_offset_ms;
        self
    }

    pub fn session(&self) -> &Arc<WsSession> {
        &self.session
    }

    /// Issue one RPC call and wait for its correlated reply.
    ///
    /// The transport enforces no deadline of its own: a call against a dead
    /// but not yet closed session waits until the caller's own timeout or
    /// cancellation fires. Callers that need bounded latency must wrap this
    /// future (or use [`Self::call_with_timeout`]).
    #[instrument(skip(self, request), fields(method = %request.path, signed = request.signed))]
    pub async fn call(&self, request: &Request) -> Result<WsResponse, TransportError> {
        let mut query = request.query.clone();
        if request.signed {
            let credentials = self.credentials.as_ref().ok_or_else(|| {
                TransportError::Configuration(
                    "request requires a signature but no credentials are configured".to_string(),
                )
            })?;
            query.set("apiKey", credentials.api_key());
            query.set("recvWindow", self.recv_window_ms);
            query.set("timestamp", timestamp_ms(self.time_offset_ms)?);
            let signature = credentials.sign(query.encode().as_bytes())?;
            query.set("signature", signature);
        }

        let id = Uuid::new_v4().to_string();
        let envelope = if query.is_empty() {
            json!({ "id": id, "method": request.path })
        } else {
            json!({ "id": id, "method": request.path, "params": query.to_json_object() })
        };

        // Register before writing so a reply racing the send still finds its
        // waiter. The guard removes the entry on every exit path, including
        // write failure and drop-based cancellation.
        let reply = self.session.register(id.clone())?;
        let _guard = DeregisterGuard {
            session: &self.session,
            id: &id,
        };

        self.session.send(Message::Text(envelope.to_string())).await?;

        match reply.await {
            Ok(result) => result,
            // Sender dropped without a reply; only reachable if the session
            // shut down between delivery and close.
            Err(_) => Err(TransportError::SessionClosed),
        }
    }

    /// [`Self::call`] bounded by a deadline; maps expiry to
    /// [`TransportError::Timeout`] with the pending entry already removed.
    pub async fn call_with_timeout(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<WsResponse, TransportError> {
        tokio::time::timeout(timeout, self.call(request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

/// Scoped cleanup for a pending-call registration: the registry entry must
/// never outlive the call that created it.
struct DeregisterGuard<'a> {
    session: &'a WsSession,
    id: &'a str,
}

impl Drop for DeregisterGuard<'_> {
    fn drop(&mut self) {
        self.session.deregister(self.id);
    }
}
