//! Outgoing request annotation
//!
//! Decides per request whether a bearer credential is attached. Requests whose
//! URL contains an exempt pattern (password reset, code verification,
//! anonymous lookups, the reissue endpoint) are sent bare, with any stale
//! `Authorization` header stripped. Everything else gets the current access
//! token from the store. A failed store read is treated as "no credential":
//! the request goes out unauthenticated and fails downstream on its own.

use common::Secret;
use session_auth::TokenStore;
use tracing::{debug, warn};

use crate::request::PendingRequest;

/// What the annotator did to a request.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// URL matched an exempt pattern; no credential attached.
    Exempt,
    /// Sent with this access token.
    Bearer(Secret<String>),
    /// Not exempt, but no credential was available.
    Anonymous,
}

impl Annotation {
    pub fn is_exempt(&self) -> bool {
        matches!(self, Annotation::Exempt)
    }

    /// Token the request carried, if any.
    pub fn token(&self) -> Option<&Secret<String>> {
        match self {
            Annotation::Bearer(token) => Some(token),
            Annotation::Exempt | Annotation::Anonymous => None,
        }
    }
}

/// Attaches the stored access token to non-exempt requests.
pub struct RequestAnnotator {
    exempt_patterns: Vec<String>,
    tokens: TokenStore,
}

impl RequestAnnotator {
    pub fn new(exempt_patterns: Vec<String>, tokens: TokenStore) -> Self {
        Self {
            exempt_patterns,
            tokens,
        }
    }

    /// Whether `url` contains any exempt pattern.
    pub fn is_exempt(&self, url: &str) -> bool {
        self.exempt_patterns
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
    }

    /// Set or strip the request's `Authorization` header.
    pub async fn annotate(&self, request: &mut PendingRequest) -> Annotation {
        if self.is_exempt(request.url()) {
            request.clear_bearer();
            debug!(request_id = %request.id(), "exempt request, credential stripped");
            return Annotation::Exempt;
        }

        let token = match self.tokens.access_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                request.clear_bearer();
                debug!(request_id = %request.id(), "no stored access token, sending anonymously");
                return Annotation::Anonymous;
            }
            Err(e) => {
                request.clear_bearer();
                warn!(request_id = %request.id(), error = %e, "credential store read failed, sending anonymously");
                return Annotation::Anonymous;
            }
        };

        match request.set_bearer(&token) {
            Ok(()) => Annotation::Bearer(token),
            Err(e) => {
                request.clear_bearer();
                warn!(request_id = %request.id(), error = %e, "stored access token unusable, sending anonymously");
                Annotation::Anonymous
            }
        }
    }
}
