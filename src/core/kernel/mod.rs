/// Transport kernel: the signed multiplexed core shared by every endpoint.
///
/// The kernel contains no per-endpoint logic. Endpoint wrappers describe a
/// call as a [`params::Request`] (method/path, query and form parameters, a
/// signature flag) and hand it to either transport:
///
/// - [`rest::RestClient`] builds a signed/unsigned HTTP request, executes it
///   and returns the raw response for the caller to decode.
/// - [`rpc::RpcClient`] sends the request as a correlated frame over the one
///   persistent [`ws::WsSession`] and suspends until the matching reply
///   arrives or the caller cancels.
///
/// Signing is a total dispatch over the configured
/// [`signer::Credentials`] scheme (HMAC-SHA256, RSA PKCS#1 v1.5 or Ed25519);
/// the canonical byte string signed is always exactly the byte string
/// transmitted.
pub mod params;
pub mod rest;
pub mod rpc;
pub mod signer;
pub mod ws;

use crate::core::errors::TransportError;
use std::time::{SystemTime, UNIX_EPOCH};

pub use params::{Params, Request};
pub use rest::{ReqwestRest, RestClient, RestResponse};
pub use rpc::RpcClient;
pub use signer::{Credentials, SigningScheme};
pub use ws::{WsResponse, WsSession};

/// Current Unix time in milliseconds, adjusted by the cached server-time
/// offset (`now - offset`).
pub(crate) fn timestamp_ms(offset_ms: i64) -> Result<i64, TransportError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| TransportError::Configuration(format!("system clock error: {e}")))?;
    Ok(i64::try_from(now.as_millis())
        .map_err(|_| TransportError::Configuration("system clock out of range".to_string()))?
        - offset_ms)
}
