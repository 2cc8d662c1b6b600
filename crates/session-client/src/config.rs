//! Client configuration

use std::time::Duration;

use reqwest::Method;
use session_auth::{DEFAULT_REFRESH_HEADER, DEFAULT_REFRESH_PATH};

/// URL substrings whose requests never carry a credential and never trigger
/// a refresh: password reset, code verification and anonymous lookups.
pub const DEFAULT_EXEMPT_PATTERNS: &[&str] = &[
    "/auth/password",
    "/auth/verify-code",
    "/auth/code",
    "/users/lookup",
];

/// Settings for `AuthClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. "https://api.example.com"
    pub base_url: String,
    /// Reissue endpoint path appended to `base_url`
    pub refresh_path: String,
    pub refresh_method: Method,
    /// Header carrying the refresh token on the reissue request and response
    pub refresh_header: String,
    /// Requests whose URL contains any of these are sent without credentials
    pub exempt_patterns: Vec<String>,
    /// Per-request timeout for ordinary API calls
    pub request_timeout: Duration,
    /// Upper bound on one reissue call; expiry fails the refresh cycle
    pub refresh_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_method: Method::POST,
            refresh_header: DEFAULT_REFRESH_HEADER.to_string(),
            exempt_patterns: DEFAULT_EXEMPT_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            request_timeout: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Defaults against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Absolute URL of the reissue endpoint.
    pub fn refresh_url(&self) -> String {
        self.url(&self.refresh_path)
    }

    /// Exempt patterns plus the reissue path itself.
    pub fn effective_exempt_patterns(&self) -> Vec<String> {
        let mut patterns = self.exempt_patterns.clone();
        if !patterns.iter().any(|p| p == &self.refresh_path) {
            patterns.push(self.refresh_path.clone());
        }
        patterns
    }
}
