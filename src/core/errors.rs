use thiserror::Error;

/// Error taxonomy for the transport kernel.
///
/// Construction and signing problems surface as `Configuration`/`Signature`
/// before anything touches the network. Wire-level failures map to `Network`,
/// `SessionClosed` and `Timeout`. The kernel never retries; every error is
/// returned to the immediate caller.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("signing failed: {0}")]
    Signature(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("websocket session closed")]
    SessionClosed,

    #[error("request timed out")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),
}
