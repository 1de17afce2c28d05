//! Client configuration.
//!
//! The only required setting is the API base URL.  Applications usually
//! build it from the environment with [`ClientConfig::from_env`].

use crate::error::SdkError;

/// Base URL used when `EXPENSA_API_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "EXPENSA_API_BASE_URL";

/// Settings for an [`crate::ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Absolute base URL every request path is appended to, without a
    /// trailing slash (e.g. `http://localhost:8080/api/v1`).
    pub base_url: String,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl ClientConfig {
    /// Configuration for an explicit base URL.  Trailing slashes are trimmed.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: format!("expensa-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Build the configuration from environment variables.
    ///
    /// | Variable               | Default                          | Description       |
    /// |------------------------|----------------------------------|-------------------|
    /// | `EXPENSA_API_BASE_URL` | `http://localhost:8080/api/v1`   | REST API base URL |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Check that the base URL is usable.
    ///
    /// # Errors
    ///
    /// [`SdkError::Config`] if the URL is empty or not `http(s)://`.
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.base_url.is_empty() {
            return Err(SdkError::Config("base URL must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SdkError::Config(format!(
                "base URL must start with http:// or https://, got `{}`",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
