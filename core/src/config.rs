//! Client configuration.
//!
//! A single base-URL setting, resolved once at startup. There is no runtime
//! reconfiguration; every other component receives a `RiderConfig` by value
//! at construction time.

/// Environment variable consulted by [`RiderConfig::from_env`].
pub const BASE_URL_ENV: &str = "RIDER_API_BASE_URL";

/// Base URL used when the environment does not provide one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:4000";

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct RiderConfig {
    base_url: String,
}

impl RiderConfig {
    /// Build a configuration from an explicit base URL. Trailing slashes are
    /// trimmed so joined URLs never carry a double slash.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve the base URL from `RIDER_API_BASE_URL`, falling back to
    /// [`DEFAULT_BASE_URL`].
    pub fn from_env() -> Self {
        let base = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(&base)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join the base URL with an endpoint path, inserting a `/` when the path
    /// does not already start with one.
    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}
