//! Replayable request description
//!
//! A `PendingRequest` keeps everything needed to send the same request twice:
//! method, URL, headers and a buffered body. The `retried` flag is set when
//! the request is parked on a refresh, which bounds automatic retries to one.

use bytes::Bytes;
use common::Secret;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use session_auth::BEARER_SCHEME;
use uuid::Uuid;

use crate::error::{Error, Result};

/// An outgoing request that can be replayed after a credential refresh.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    id: Uuid,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    retried: bool,
}

impl PendingRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)
            .map_err(|e| Error::InvalidRequest(format!("encoding JSON body: {e}")))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(encoded));
        Ok(self)
    }

    /// Identifier used in log fields.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Whether this request already went through one refresh retry.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Replace any authorization header with `Bearer <token>`.
    pub(crate) fn set_bearer(&mut self, token: &Secret<String>) -> Result<()> {
        let mut value = HeaderValue::from_str(&format!("{BEARER_SCHEME} {}", token.expose()))
            .map_err(|e| Error::InvalidRequest(format!("access token is not a valid header: {e}")))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    pub(crate) fn clear_bearer(&mut self) {
        self.headers.remove(AUTHORIZATION);
    }

    /// Build a sendable request on `client`. The body is cheaply cloned.
    pub(crate) fn build(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let builder = client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        match &self.body {
            Some(body) => builder.body(body.clone()),
            None => builder,
        }
    }
}

/// Whether a response status means the credential was rejected.
pub(crate) fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_not_retried() {
        let request = PendingRequest::get("http://api/items");
        assert!(!request.is_retried());
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url(), "http://api/items");
    }

    #[test]
    fn ids_are_unique() {
        let a = PendingRequest::get("http://api/a");
        let b = PendingRequest::get("http://api/a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn set_bearer_replaces_existing_header() {
        let mut request = PendingRequest::get("http://api/items").header(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer stale"),
        );
        request.set_bearer(&Secret::from("at_2")).unwrap();

        assert_eq!(request.headers()[AUTHORIZATION], "Bearer at_2");
        assert!(request.headers()[AUTHORIZATION].is_sensitive());
        assert_eq!(request.headers().get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn set_bearer_rejects_unprintable_token() {
        let mut request = PendingRequest::get("http://api/items");
        let err = request.set_bearer(&Secret::from("bad\ntoken")).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn json_sets_body_and_content_type() {
        let request = PendingRequest::post("http://api/items")
            .json(&serde_json::json!({"name": "widget"}))
            .unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            request.body.as_deref(),
            Some(br#"{"name":"widget"}"#.as_slice())
        );
    }

    #[test]
    fn clone_keeps_id_for_replay() {
        let request = PendingRequest::get("http://api/items");
        let replay = request.clone();
        assert_eq!(request.id(), replay.id());
    }

    #[test]
    fn only_401_is_auth_failure() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(!is_auth_failure(StatusCode::FORBIDDEN));
        assert!(!is_auth_failure(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_auth_failure(StatusCode::OK));
    }
}
