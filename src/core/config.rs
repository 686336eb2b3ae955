/// Client configuration for the transport kernel.
///
/// Everything the kernel needs is carried explicitly in this struct; there is
/// no ambient process-wide state. Credentials are configured separately (see
/// [`crate::core::kernel::signer::Credentials`]) because public market-data
/// clients legitimately run without any.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for REST requests, e.g. `https://api.binance.com`.
    pub rest_url: String,
    /// WebSocket API endpoint, e.g. `wss://ws-api.binance.com/ws-api/v3`.
    pub ws_url: String,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent string to include in requests.
    pub user_agent: String,
    /// `recvWindow` tolerance (milliseconds) attached to signed WS-RPC calls.
    pub recv_window_ms: u64,
    /// Cached clock offset against the exchange's server time, in
    /// milliseconds. Signed timestamps are computed as `now - offset`.
    pub time_offset_ms: i64,
}

impl ClientConfig {
    pub fn new(rest_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            rest_url: rest_url.into(),
            ws_url: ws_url.into(),
            timeout_secs: 30,
            user_agent: format!("exmux/{}", env!("CARGO_PKG_VERSION")),
            recv_window_ms: 5_000,
            time_offset_ms: 0,
        }
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the `recvWindow` used by signed WS-RPC calls.
    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    /// Set the initial server-time offset. See
    /// [`crate::core::kernel::rest::ReqwestRest::calibrate_time_offset`] for
    /// populating this from a live server-time probe.
    pub fn with_time_offset(mut self, time_offset_ms: i64) -> Self {
        self.time_offset_ms = time_offset_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::new("https://api.example.com", "wss://ws.example.com");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.recv_window_ms, 5_000);
        assert_eq!(config.time_offset_ms, 0);
        assert!(config.user_agent.starts_with("exmux/"));
    }

    #[test]
    fn builder_setters_override() {
        let config = ClientConfig::new("https://api.example.com", "wss://ws.example.com")
            .with_timeout(5)
            .with_recv_window(10_000)
            .with_time_offset(-250);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.recv_window_ms, 10_000);
        assert_eq!(config.time_offset_ms, -250);
    }
}
