//! Authenticated transport
//!
//! `AuthClient` is the one place requests are sent from. It annotates each
//! request, dispatches it, and routes 401 responses to the shared
//! `RefreshCoordinator`. `send` owns the request and replays it at most once;
//! a 401 on the replay is returned to the caller as `Error::Unauthorized`. Exempt requests and
//! non-401 responses bypass the coordinator entirely.

use std::sync::Arc;

use reqwest::header::HeaderName;
use session_auth::{CredentialPair, KeyValueStore, TokenExchanger, TokenStore};
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::annotator::{Annotation, RequestAnnotator};
use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::error::{Error, Result};
use crate::invalidator::{SessionEvent, SessionInvalidator};
use crate::request::{PendingRequest, is_auth_failure};

/// HTTP client that manages bearer credentials and their refresh.
pub struct AuthClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: TokenStore,
    annotator: RequestAnnotator,
    coordinator: Arc<RefreshCoordinator>,
    invalidator: SessionInvalidator,
}

impl AuthClient {
    /// Build a client over the given credential store.
    ///
    /// The reissue call gets its own `reqwest::Client` so it never passes
    /// through annotation.
    pub fn new(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::InvalidRequest(format!("building HTTP client: {e}")))?;
        let reissue_http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::InvalidRequest(format!("building reissue client: {e}")))?;

        let refresh_header = HeaderName::from_bytes(config.refresh_header.as_bytes())
            .map_err(|e| {
                Error::InvalidRequest(format!(
                    "invalid refresh header {:?}: {e}",
                    config.refresh_header
                ))
            })?;

        let tokens = TokenStore::new(store);
        let exchanger = TokenExchanger::new(reissue_http, config.refresh_url())
            .with_method(config.refresh_method.clone())
            .with_refresh_header(refresh_header);
        let invalidator = SessionInvalidator::new(tokens.clone());
        let coordinator = RefreshCoordinator::new(
            tokens.clone(),
            exchanger,
            invalidator.clone(),
            config.refresh_timeout,
        );
        let annotator = RequestAnnotator::new(config.effective_exempt_patterns(), tokens.clone());

        Ok(Self {
            http,
            config,
            tokens,
            annotator,
            coordinator,
            invalidator,
        })
    }

    /// GET request against an API path.
    pub fn get(&self, path: &str) -> PendingRequest {
        PendingRequest::get(self.config.url(path))
    }

    /// POST request against an API path.
    pub fn post(&self, path: &str) -> PendingRequest {
        PendingRequest::post(self.config.url(path))
    }

    /// Subscribe to the session invalidation signal.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.invalidator.subscribe()
    }

    /// Typed view of the credential store.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Store credentials obtained from a sign-in.
    pub async fn login(&self, pair: CredentialPair) -> Result<()> {
        self.tokens.store_pair(&pair).await?;
        self.coordinator.reset_issued();
        debug!("credentials stored");
        Ok(())
    }

    /// User-initiated sign-out: clears the store without broadcasting a
    /// forced logout.
    pub async fn logout(&self) -> Result<()> {
        self.tokens.clear().await?;
        self.coordinator.reset_issued();
        debug!("credentials cleared");
        Ok(())
    }

    /// Send a request, refreshing credentials once on 401.
    ///
    /// Non-401 responses (including 4xx/5xx) are returned as `Ok`. Transport
    /// failures are `Error::Http`. A failed refresh is `Error::Refresh` and a
    /// 401 after the replay is `Error::Unauthorized`.
    #[instrument(skip_all, fields(request_id = %request.id(), method = %request.method(), url = %request.url()))]
    pub async fn send(&self, mut request: PendingRequest) -> Result<reqwest::Response> {
        let annotation = self.annotator.annotate(&mut request).await;
        let response = self.dispatch(&request).await?;
        let status = response.status();

        if !is_auth_failure(status) {
            return Ok(response);
        }

        let sent_with = match annotation {
            Annotation::Exempt => {
                debug!("exempt request got 401, not refreshing");
                return Ok(response);
            }
            Annotation::Bearer(token) => Some(token),
            Annotation::Anonymous => None,
        };

        request.mark_retried();

        let token = self
            .coordinator
            .handle_unauthorized(sent_with.as_ref())
            .await?;
        request.set_bearer(&token)?;

        let response = self.dispatch(&request).await?;
        let status = response.status();
        if is_auth_failure(status) {
            warn!("request rejected again after credential refresh");
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }
        debug!(status = status.as_u16(), "replayed request after refresh");
        Ok(response)
    }

    async fn dispatch(&self, request: &PendingRequest) -> Result<reqwest::Response> {
        request
            .build(&self.http)
            .send()
            .await
            .map_err(|e| Error::Http(format!("request failed: {e}")))
    }
}
