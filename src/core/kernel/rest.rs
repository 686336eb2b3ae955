use crate::core::config::ClientConfig;
use crate::core::errors::TransportError;
use crate::core::kernel::params::{Params, Request};
use crate::core::kernel::signer::{Credentials, SigningScheme};
use crate::core::kernel::timestamp_ms;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{instrument, trace};

/// Header carrying the API key on signed/keyed requests.
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Raw HTTP response handed back to the endpoint layer.
///
/// The transport does not interpret status codes or decode bodies; that is
/// the caller's concern.
#[derive(Debug)]
pub struct RestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RestResponse {
    /// Decode the body as JSON. Convenience for endpoint wrappers; the raw
    /// bytes stay available either way.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// REST transport seam used by endpoint wrappers.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Build, optionally sign, and execute a request, returning the raw
    /// response. No retries, no caching; errors propagate unchanged.
    async fn send(&self, request: &Request) -> Result<RestResponse, TransportError>;
}

/// `RestClient` implementation backed by reqwest.
///
/// Safe for concurrent use: each call builds a fresh request and the only
/// shared mutable state is the cached server-time offset.
pub struct ReqwestRest {
    client: Client,
    config: ClientConfig,
    credentials: Option<Arc<Credentials>>,
    time_offset_ms: AtomicI64,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("rest_url", &self.config.rest_url)
            .field("has_credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn new(
        config: ClientConfig,
        credentials: Option<Arc<Credentials>>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                TransportError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        let time_offset_ms = AtomicI64::new(config.time_offset_ms);
        Ok(Self {
            client,
            config,
            credentials,
            time_offset_ms,
        })
    }

    /// The clock offset currently applied to signed timestamps.
    pub fn time_offset_ms(&self) -> i64 {
        self.time_offset_ms.load(Ordering::Relaxed)
    }

    pub fn set_time_offset_ms(&self, offset_ms: i64) {
        self.time_offset_ms.store(offset_ms, Ordering::Relaxed);
    }

    /// Probe the exchange's server-time endpoint and cache `local - server`
    /// as the clock offset for subsequent signed requests.
    ///
    /// Never called implicitly; a client that wants drift tolerance invokes
    /// this once at startup (and again whenever it suspects drift).
    pub async fn calibrate_time_offset(&self, path: &str) -> Result<i64, TransportError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ServerTime {
            server_time: i64,
        }

        let request = Request::new(reqwest::Method::GET, path);
        let response = self.send(&request).await?;
        let server: ServerTime = response.json()?;
        let offset = timestamp_ms(0)? - server.server_time;
        self.set_time_offset_ms(offset);
        Ok(offset)
    }

    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path, signed = request.signed))]
    async fn execute(&self, request: &Request) -> Result<RestResponse, TransportError> {
        let form_body = request.form.encode();
        let query_string = if request.signed {
            let credentials = self.credentials.as_ref().ok_or_else(|| {
                TransportError::Configuration(
                    "request requires a signature but no credentials are configured".to_string(),
                )
            })?;
            let timestamp = timestamp_ms(self.time_offset_ms())?;
            build_signed_query(&request.query, &form_body, credentials, timestamp)?
        } else {
            request.query.encode()
        };

        let mut url = format!("{}{}", self.config.rest_url, request.path);
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(credentials) = &self.credentials {
            builder = builder.header(API_KEY_HEADER, credentials.api_key());
        }
        if !form_body.is_empty() {
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form_body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        trace!(status = %status, body_len = body.len(), "response received");

        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    async fn send(&self, request: &Request) -> Result<RestResponse, TransportError> {
        self.execute(request).await
    }
}

/// Produce the final signed query string for a REST request.
///
/// The timestamp is appended to the query parameters first, the canonical
/// string is encoded, and the signature is computed over exactly those bytes:
/// encoded query plus encoded form body for HMAC, encoded query alone for
/// RSA/Ed25519. The signature is then appended to the already-encoded string
/// so the signed bytes and the transmitted bytes cannot diverge.
pub(crate) fn build_signed_query(
    query: &Params,
    form_encoded: &str,
    credentials: &Credentials,
    timestamp: i64,
) -> Result<String, TransportError> {
    let mut query = query.clone();
    query.set("timestamp", timestamp);
    let encoded = query.encode();

    let signature = match credentials.scheme() {
        SigningScheme::Hmac(_) => {
            let payload = format!("{encoded}{form_encoded}");
            credentials.sign(payload.as_bytes())?
        }
        SigningScheme::Rsa(_) | SigningScheme::Ed25519(_) => {
            credentials.sign(encoded.as_bytes())?
        }
    };
    let signature: String = url::form_urlencoded::byte_serialize(signature.as_bytes()).collect();

    Ok(format!("{encoded}&signature={signature}"))
}
