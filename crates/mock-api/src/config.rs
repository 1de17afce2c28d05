//! Mock server configuration.
//!
//! Built from environment variables at startup and carried in
//! [`crate::MockState`].

/// Path prefix every route is served under.
pub const API_PREFIX: &str = "/api/v1";

/// Settings for the mock API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConfig {
    /// Port to listen on (default `8080`).
    pub listen_port: u16,
    /// Lifetime of issued access tokens, in seconds (default `900`).
    pub access_token_ttl_secs: u64,
}

impl MockConfig {
    /// Build the configuration from environment variables.
    ///
    /// | Variable                 | Default | Description                    |
    /// |--------------------------|---------|--------------------------------|
    /// | `MOCK_API_PORT`          | `8080`  | HTTP listen port               |
    /// | `MOCK_API_ACCESS_TTL`    | `900`   | Access-token lifetime (seconds)|
    pub fn from_env() -> Self {
        let listen_port: u16 = std::env::var("MOCK_API_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let access_token_ttl_secs: u64 = std::env::var("MOCK_API_ACCESS_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(900);

        Self {
            listen_port,
            access_token_ttl_secs,
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            access_token_ttl_secs: 900,
        }
    }
}
