//! Single-flight credential refresh
//!
//! States: idle (`refreshing == false`, no waiters) and refreshing.
//!
//! Every request that gets a 401 calls `handle_unauthorized`. Under one
//! acquisition of the state mutex it either:
//! - takes the stale-token shortcut (the request was sent with a token older
//!   than one this coordinator already issued, so it is retried with the
//!   newer token and no reissue happens),
//! - enqueues itself behind a cycle that is already running, or
//! - enqueues itself, flips `refreshing` and spawns the cycle.
//!
//! The mutex is a `std::sync::Mutex` and is never held across an `.await`,
//! so the check and the enqueue cannot be split by another caller.
//!
//! The cycle runs on its own task so a caller that gives up cannot strand the
//! other waiters. It reads the stored pair, calls the reissue endpoint under
//! `refresh_timeout`, then either persists the new pair or invalidates the
//! session (a pair that cannot be persisted counts as a failure), and finally (again under one lock acquisition) resets
//! `refreshing` and drains the waiters, which are answered in FIFO order.
//!
//! Cycle transitions:
//! - idle → refreshing: first 401 while idle (and not stale)
//! - refreshing → idle (success): pair persisted, waiters get the new token
//! - refreshing → idle (failure): store cleared, `ForcedLogout` broadcast
//!   once, waiters get the `RefreshError`

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::Secret;
use session_auth::{TokenExchanger, TokenStore};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::RefreshError;
use crate::invalidator::SessionInvalidator;
use crate::metrics;

type Outcome = std::result::Result<Secret<String>, RefreshError>;

/// Mutable refresh state. `refreshing == false` implies `waiters` is empty.
#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
    /// Access token produced by the last successful cycle, cleared by a
    /// failed cycle or an explicit sign-in/sign-out.
    last_issued: Option<Secret<String>>,
}

/// Outcome of the synchronous admission step.
enum Admission {
    Retry(Secret<String>),
    Wait {
        receiver: oneshot::Receiver<Outcome>,
        leader: bool,
    },
}

/// Coordinates credential refresh across all in-flight requests.
///
/// Held as `Arc<RefreshCoordinator>`; one instance per signed-in session store.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    tokens: TokenStore,
    exchanger: TokenExchanger,
    invalidator: SessionInvalidator,
    refresh_timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        tokens: TokenStore,
        exchanger: TokenExchanger,
        invalidator: SessionInvalidator,
        refresh_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RefreshState::default()),
            tokens,
            exchanger,
            invalidator,
            refresh_timeout,
        })
    }

    /// Obtain a fresh access token for a request that got a 401.
    ///
    /// `sent_with` is the token the rejected request carried. Resolves once
    /// the cycle this call joined (or started) completes. Every caller in one
    /// cycle receives the same outcome.
    pub async fn handle_unauthorized(
        self: &Arc<Self>,
        sent_with: Option<&Secret<String>>,
    ) -> Outcome {
        match self.admit(sent_with) {
            Admission::Retry(token) => {
                debug!("request raced a completed refresh, retrying with issued token");
                Ok(token)
            }
            Admission::Wait { receiver, leader } => {
                if leader {
                    let this = Arc::clone(self);
                    tokio::spawn(async move { this.run_cycle().await });
                } else {
                    metrics::record_waiter();
                    debug!("refresh already in flight, queued");
                }
                receiver.await.unwrap_or(Err(RefreshError::Abandoned))
            }
        }
    }

    /// Whether a cycle is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.lock_state().refreshing
    }

    /// Number of requests parked on the running cycle.
    pub fn waiting(&self) -> usize {
        self.lock_state().waiters.len()
    }

    /// Forget the last issued token after a sign-in or sign-out elsewhere.
    pub fn reset_issued(&self) {
        self.lock_state().last_issued = None;
    }

    /// Check-and-enqueue. Runs to completion without suspending.
    fn admit(&self, sent_with: Option<&Secret<String>>) -> Admission {
        let mut state = self.lock_state();

        if !state.refreshing {
            if let (Some(issued), Some(sent)) = (&state.last_issued, sent_with) {
                if !issued.matches(sent.expose()) {
                    return Admission::Retry(issued.clone());
                }
            }
        }

        let (sender, receiver) = oneshot::channel();
        state.waiters.push(sender);
        let leader = !state.refreshing;
        state.refreshing = true;
        Admission::Wait { receiver, leader }
    }

    async fn run_cycle(&self) {
        let mut guard = CycleGuard {
            state: &self.state,
            finished: false,
        };

        info!("access token rejected, reissuing credentials");
        let outcome = match tokio::time::timeout(self.refresh_timeout, self.reissue()).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Timeout(self.refresh_timeout)),
        };

        match &outcome {
            Ok(_) => metrics::record_refresh("success"),
            Err(e) => {
                metrics::record_refresh("failure");
                warn!(error = %e, "credential refresh failed, forcing logout");
                self.invalidator.invalidate().await;
            }
        }

        let waiters = {
            let mut state = self.lock_state();
            state.refreshing = false;
            state.last_issued = outcome.as_ref().ok().cloned();
            std::mem::take(&mut state.waiters)
        };
        guard.finished = true;

        info!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "refresh cycle complete"
        );
        for waiter in waiters {
            // A dropped receiver means the caller gave up; nothing to deliver.
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Read the stored pair, exchange it and persist the result.
    async fn reissue(&self) -> Outcome {
        let current = self
            .tokens
            .credential_pair()
            .await
            .map_err(RefreshError::from)?
            .ok_or(RefreshError::CredentialsMissing)?;

        let fresh = self.exchanger.exchange(&current).await?;

        // The old refresh token is spent once the exchange succeeds, so a pair
        // that cannot be persisted ends the session.
        self.tokens
            .store_pair(&fresh)
            .await
            .map_err(|e| RefreshError::Store(format!("persisting reissued credentials: {e}")))?;
        Ok(fresh.access)
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the coordinator to idle if a cycle task unwinds before finishing.
/// Dropping the waiters resolves them with `RefreshError::Abandoned`.
struct CycleGuard<'a> {
    state: &'a Mutex<RefreshState>,
    finished: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.refreshing = false;
            state.waiters.clear();
        }
    }
}
