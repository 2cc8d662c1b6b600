//! Error types for credential storage and token reissue

/// Errors from credential storage and reissue operations.
///
/// `Clone` so a single reissue outcome can be handed to every request that
/// waited on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token reissue failed: {0}")]
    ReissueFailed(String),

    #[error("stored credentials missing: {0}")]
    CredentialsMissing(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for session auth operations.
pub type Result<T> = std::result::Result<T, Error>;
