//! Error types for authenticated requests and refresh cycles

use std::time::Duration;

/// Outcome of a failed refresh cycle.
///
/// `Clone` because one failure is delivered to every request that waited on
/// the cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no stored credentials to refresh")]
    CredentialsMissing,

    #[error("token reissue failed: {0}")]
    ReissueFailed(String),

    #[error("reissue request failed: {0}")]
    Network(String),

    #[error("token reissue timed out after {0:?}")]
    Timeout(Duration),

    #[error("credential store error: {0}")]
    Store(String),

    #[error("refresh cycle ended without a result")]
    Abandoned,
}

impl From<session_auth::Error> for RefreshError {
    fn from(err: session_auth::Error) -> Self {
        match err {
            session_auth::Error::Http(msg) => RefreshError::Network(msg),
            session_auth::Error::ReissueFailed(msg) => RefreshError::ReissueFailed(msg),
            session_auth::Error::CredentialsMissing(_) => RefreshError::CredentialsMissing,
            session_auth::Error::CredentialParse(msg) => RefreshError::ReissueFailed(msg),
            session_auth::Error::Io(msg) => RefreshError::Store(msg),
        }
    }
}

/// Errors surfaced to callers of `AuthClient`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request still unauthorized after credential refresh (status {status})")]
    Unauthorized { status: u16 },

    #[error("credential refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("credential store error: {0}")]
    Store(String),
}

impl From<session_auth::Error> for Error {
    fn from(err: session_auth::Error) -> Self {
        Error::Store(err.to_string())
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
