//! Token reissue against the API's refresh endpoint
//!
//! The reissue call sends the expiring access token as a bearer credential and
//! the refresh token in a dedicated header, with no body. A successful response
//! carries the new access token in `Authorization: Bearer <token>` and the new
//! refresh token in the same dedicated header.
//!
//! The exchanger owns a plain `reqwest::Client` that never goes through request
//! annotation, so the expiring credential is not re-attached recursively. It
//! does not persist anything: the caller stores the new pair only once the
//! whole exchange has succeeded.

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::constants::{BEARER_SCHEME, DEFAULT_REFRESH_HEADER};
use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// Performs the access/refresh token exchange.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    client: reqwest::Client,
    endpoint: String,
    method: Method,
    refresh_header: HeaderName,
}

impl TokenExchanger {
    /// Exchanger posting to `endpoint` with the default refresh header.
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            method: Method::POST,
            refresh_header: HeaderName::from_static(DEFAULT_REFRESH_HEADER),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_refresh_header(mut self, header: HeaderName) -> Self {
        self.refresh_header = header;
        self
    }

    /// Full URL of the reissue endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Trade the current pair for a new one.
    ///
    /// Non-2xx responses and 2xx responses missing either new token are
    /// `ReissueFailed`; transport failures are `Http`.
    pub async fn exchange(&self, current: &CredentialPair) -> Result<CredentialPair> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            sensitive_value(&format!("{BEARER_SCHEME} {}", current.access.expose()))?,
        );
        headers.insert(
            self.refresh_header.clone(),
            sensitive_value(current.refresh.expose())?,
        );

        let response = self
            .client
            .request(self.method.clone(), &self.endpoint)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::Http(format!("reissue request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::ReissueFailed(format!(
                "reissue endpoint returned {status}: {body}"
            )));
        }

        let access = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
            .ok_or_else(|| {
                Error::ReissueFailed("response has no bearer access token".into())
            })?;

        let refresh = response
            .headers()
            .get(&self.refresh_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::ReissueFailed(format!(
                    "response has no {} header",
                    self.refresh_header.as_str()
                ))
            })?;

        debug!(endpoint = %self.endpoint, "reissue succeeded");
        Ok(CredentialPair::new(access, refresh))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively. Returns `None` for other schemes
/// or an empty token.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn sensitive_value(raw: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(raw)
        .map_err(|e| Error::CredentialParse(format!("stored token is not a valid header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}
