//! Forced logout
//!
//! When a refresh cycle fails the session is unrecoverable: the invalidator
//! wipes the credential store (pair and identity cache) and broadcasts one
//! `SessionEvent::ForcedLogout` to every subscriber. Subscribers are expected
//! to treat repeats idempotently; the coordinator calls `invalidate` once per
//! failed cycle.

use session_auth::TokenStore;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::metrics;

/// Events on the session invalidation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials were revoked; the user is signed out.
    ForcedLogout,
}

/// Clears stored credentials and broadcasts the forced-logout signal.
#[derive(Clone)]
pub struct SessionInvalidator {
    tokens: TokenStore,
    signal: broadcast::Sender<SessionEvent>,
}

impl SessionInvalidator {
    pub fn new(tokens: TokenStore) -> Self {
        let (signal, _) = broadcast::channel(16);
        Self { tokens, signal }
    }

    /// Receive future `SessionEvent`s.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.signal.subscribe()
    }

    /// Wipe credentials and broadcast `ForcedLogout`.
    ///
    /// A store failure is logged and does not suppress the broadcast: the
    /// session is over either way.
    pub async fn invalidate(&self) {
        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "failed to clear credential store during forced logout");
        }
        metrics::record_logout();
        match self.signal.send(SessionEvent::ForcedLogout) {
            Ok(subscribers) => info!(subscribers, "forced logout broadcast"),
            Err(_) => debug!("forced logout with no subscribers"),
        }
    }
}
