//! Typed access to the session credential pair
//!
//! `TokenStore` wraps a `KeyValueStore` and exposes the access/refresh pair
//! and the cached user identity under fixed keys. The pair is written only
//! by the refresh coordinator (after a successful reissue) and by sign-in;
//! logout and failed reissues wipe the whole scope.

use std::sync::Arc;

use common::Secret;
use tracing::warn;

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_IDENTITY_KEY};
use crate::error::Result;
use crate::store::KeyValueStore;

/// Access and refresh credentials, always handled together.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    /// Short-lived bearer token attached to API requests
    pub access: Secret<String>,
    /// Longer-lived token used only to obtain a new access token
    pub refresh: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: Secret::new(refresh.into()),
        }
    }
}

/// Typed adapter over the credential `KeyValueStore`.
///
/// Cheap to clone; all clones share the same backing store.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Current access token, if signed in.
    pub async fn access_token(&self) -> Result<Option<Secret<String>>> {
        Ok(self.inner.get(ACCESS_TOKEN_KEY).await?.map(Secret::new))
    }

    /// Current refresh token, if signed in.
    pub async fn refresh_token(&self) -> Result<Option<Secret<String>>> {
        Ok(self.inner.get(REFRESH_TOKEN_KEY).await?.map(Secret::new))
    }

    /// Both credentials, or `None` unless both are present.
    ///
    /// A half-written pair reads as absent: it cannot be used for a reissue.
    pub async fn credential_pair(&self) -> Result<Option<CredentialPair>> {
        let access = self.access_token().await?;
        let refresh = self.refresh_token().await?;
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair { access, refresh })),
            (None, None) => Ok(None),
            (access, refresh) => {
                warn!(
                    has_access = access.is_some(),
                    has_refresh = refresh.is_some(),
                    "credential store holds an incomplete pair"
                );
                Ok(None)
            }
        }
    }

    /// Persist a new pair, access first then refresh.
    ///
    /// If the refresh write fails the access write is undone (the previous
    /// access token is restored, or the scope is cleared when there was
    /// none), so a new access token is never left beside an old refresh token.
    pub async fn store_pair(&self, pair: &CredentialPair) -> Result<()> {
        let previous = self.inner.get(ACCESS_TOKEN_KEY).await?;
        self.inner
            .set(ACCESS_TOKEN_KEY, pair.access.expose().clone())
            .await?;

        if let Err(e) = self
            .inner
            .set(REFRESH_TOKEN_KEY, pair.refresh.expose().clone())
            .await
        {
            let rollback = match previous {
                Some(access) => self.inner.set(ACCESS_TOKEN_KEY, access).await,
                None => self.inner.clear().await,
            };
            if let Err(rollback_err) = rollback {
                warn!(error = %rollback_err, "failed to roll back access token after partial write");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Cached identity of the signed-in user.
    pub async fn user_identity(&self) -> Result<Option<String>> {
        self.inner.get(USER_IDENTITY_KEY).await
    }

    pub async fn set_user_identity(&self, identity: String) -> Result<()> {
        self.inner.set(USER_IDENTITY_KEY, identity).await
    }

    /// Remove the credential pair and the identity cache.
    pub async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}
