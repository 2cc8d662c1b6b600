//! End-to-end refresh behavior against a mock API server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use session_client::{
    AuthClient, ClientConfig, CredentialPair, Error, FileStore, KeyValueStore, MemoryStore,
    RefreshError, SessionEvent,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Clone, Copy)]
enum ReissueMode {
    Succeed,
    Deny,
}

/// Recorded server-side view of the traffic.
struct MockApi {
    mode: ReissueMode,
    reissue_delay: Duration,
    reissue_calls: AtomicUsize,
    /// (authorization, refresh-token) of each reissue request
    reissue_seen: Mutex<Vec<(Option<String>, Option<String>)>>,
    /// (path, authorization) of each API request
    hits: Mutex<Vec<(String, Option<String>)>>,
}

impl MockApi {
    fn hits_for(&self, path: &str) -> Vec<Option<String>> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, auth)| auth.clone())
            .collect()
    }

    fn record(&self, path: String, headers: &HeaderMap) -> Option<String> {
        let auth = header_string(headers, "authorization");
        self.hits.lock().unwrap().push((path, auth.clone()));
        auth
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn reissue(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.reissue_calls.fetch_add(1, Ordering::SeqCst);
    api.reissue_seen.lock().unwrap().push((
        header_string(&headers, "authorization"),
        header_string(&headers, "refresh-token"),
    ));
    tokio::time::sleep(api.reissue_delay).await;
    match api.mode {
        ReissueMode::Succeed => (
            StatusCode::OK,
            [("authorization", "Bearer at_2"), ("refresh-token", "rt_2")],
        )
            .into_response(),
        ReissueMode::Deny => (StatusCode::UNAUTHORIZED, "refresh token expired").into_response(),
    }
}

/// Accepts only the reissued token.
async fn item(
    State(api): State<Arc<MockApi>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let auth = api.record(format!("/items/{id}"), &headers);
    if auth.as_deref() == Some("Bearer at_2") {
        (StatusCode::OK, format!("item {id}")).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn always_unauthorized(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.record("/always-401".into(), &headers);
    StatusCode::UNAUTHORIZED.into_response()
}

async fn server_error(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.record("/boom".into(), &headers);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn password_reset(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    api.record("/auth/password/reset".into(), &headers);
    StatusCode::UNAUTHORIZED.into_response()
}

async fn start_api(mode: ReissueMode, reissue_delay: Duration) -> (String, Arc<MockApi>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let api = Arc::new(MockApi {
        mode,
        reissue_delay,
        reissue_calls: AtomicUsize::new(0),
        reissue_seen: Mutex::new(Vec::new()),
        hits: Mutex::new(Vec::new()),
    });

    let app = axum::Router::new()
        .route("/auth/reissue", post(reissue))
        .route("/items/{id}", get(item))
        .route("/always-401", get(always_unauthorized))
        .route("/boom", get(server_error))
        .route("/auth/password/reset", post(password_reset))
        .with_state(api.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), api)
}

async fn signed_in_client(base_url: &str) -> AuthClient {
    let client = AuthClient::new(ClientConfig::new(base_url), Arc::new(MemoryStore::new())).unwrap();
    client
        .login(CredentialPair::new("at_1", "rt_1"))
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn concurrent_401s_share_one_reissue_and_replay_with_new_token() {
    let (url, api) = start_api(ReissueMode::Succeed, Duration::from_millis(150)).await;
    let client = signed_in_client(&url).await;
    let mut signal = client.subscribe();

    let (a, b, c) = tokio::join!(
        client.send(client.get("/items/a")),
        client.send(client.get("/items/b")),
        client.send(client.get("/items/c")),
    );

    for (response, id) in [(a, "a"), (b, "b"), (c, "c")] {
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), format!("item {id}"));
    }

    assert_eq!(api.reissue_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        api.reissue_seen.lock().unwrap()[0],
        (Some("Bearer at_1".to_string()), Some("rt_1".to_string()))
    );

    for path in ["/items/a", "/items/b", "/items/c"] {
        assert_eq!(
            api.hits_for(path),
            vec![Some("Bearer at_1".to_string()), Some("Bearer at_2".to_string())],
            "{path} must be sent once with the old token and retried once with the new one"
        );
    }

    let pair = client.tokens().credential_pair().await.unwrap().unwrap();
    assert_eq!(pair.access.expose(), "at_2");
    assert_eq!(pair.refresh.expose(), "rt_2");
    assert!(matches!(signal.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn failed_reissue_fails_every_request_and_logs_out_once() {
    let (url, api) = start_api(ReissueMode::Deny, Duration::from_millis(150)).await;
    let client = signed_in_client(&url).await;
    client.tokens().set_user_identity("user-1".into()).await.unwrap();
    let mut signal = client.subscribe();

    let (a, b, c) = tokio::join!(
        client.send(client.get("/items/a")),
        client.send(client.get("/items/b")),
        client.send(client.get("/items/c")),
    );

    for result in [a, b, c] {
        match result {
            Err(Error::Refresh(RefreshError::ReissueFailed(msg))) => {
                assert!(msg.contains("401"), "got: {msg}")
            }
            other => panic!("expected ReissueFailed, got {other:?}"),
        }
    }

    assert_eq!(api.reissue_calls.load(Ordering::SeqCst), 1);
    for path in ["/items/a", "/items/b", "/items/c"] {
        assert_eq!(api.hits_for(path).len(), 1, "{path} must not be retried");
    }
    assert!(client.tokens().credential_pair().await.unwrap().is_none());
    assert!(client.tokens().user_identity().await.unwrap().is_none());

    assert_eq!(signal.recv().await.unwrap(), SessionEvent::ForcedLogout);
    assert!(matches!(signal.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_parallel_401s_trigger_exactly_one_reissue() {
    let (url, api) = start_api(ReissueMode::Succeed, Duration::from_millis(100)).await;
    let client = Arc::new(signed_in_client(&url).await);

    let mut handles = vec![];
    for i in 0..16 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.send(client.get(&format!("/items/{i}"))).await
        }));
    }
    for h in handles {
        let response = h.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(api.reissue_calls.load(Ordering::SeqCst), 1);
    for i in 0..16 {
        assert_eq!(api.hits_for(&format!("/items/{i}")).len(), 2);
    }
}

#[tokio::test]
async fn second_401_after_refresh_is_terminal() {
    let (url, api) = start_api(ReissueMode::Succeed, Duration::ZERO).await;
    let client = signed_in_client(&url).await;

    let err = client.send(client.get("/always-401")).await.unwrap_err();

    assert!(matches!(err, Error::Unauthorized { status: 401 }), "got: {err}");
    assert_eq!(api.reissue_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        api.hits_for("/always-401"),
        vec![Some("Bearer at_1".to_string()), Some("Bearer at_2".to_string())]
    );
}

#[tokio::test]
async fn exempt_request_carries_no_token_and_never_refreshes() {
    let (url, api) = start_api(ReissueMode::Succeed, Duration::ZERO).await;
    let client = signed_in_client(&url).await;

    let request = client
        .post("/auth/password/reset")
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
    let response = client.send(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(api.hits_for("/auth/password/reset"), vec![None]);
    assert_eq!(api.reissue_calls.load(Ordering::SeqCst), 0);

    let pair = client.tokens().credential_pair().await.unwrap().unwrap();
    assert_eq!(pair.access.expose(), "at_1");
}

#[tokio::test]
async fn non_auth_failures_pass_through_untouched() {
    let (url, api) = start_api(ReissueMode::Succeed, Duration::ZERO).await;
    let client = signed_in_client(&url).await;

    let response = client.send(client.get("/boom")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(api.hits_for("/boom"), vec![Some("Bearer at_1".to_string())]);
    assert_eq!(api.reissue_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn transport_errors_propagate_without_refresh() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = signed_in_client(&format!("http://{addr}")).await;
    let mut signal = client.subscribe();

    let err = client.send(client.get("/items/a")).await.unwrap_err();

    assert!(matches!(err, Error::Http(_)), "got: {err}");
    assert!(client.tokens().credential_pair().await.unwrap().is_some());
    assert!(matches!(signal.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn signed_out_401_forces_logout_without_reissue() {
    let (url, api) = start_api(ReissueMode::Succeed, Duration::ZERO).await;
    let client = AuthClient::new(ClientConfig::new(&url), Arc::new(MemoryStore::new())).unwrap();
    let mut signal = client.subscribe();

    let err = client.send(client.get("/items/a")).await.unwrap_err();

    assert!(
        matches!(err, Error::Refresh(RefreshError::CredentialsMissing)),
        "got: {err}"
    );
    assert_eq!(api.hits_for("/items/a"), vec![None]);
    assert_eq!(api.reissue_calls.load(Ordering::SeqCst), 0);
    assert_eq!(signal.recv().await.unwrap(), SessionEvent::ForcedLogout);
}

#[tokio::test]
async fn reissued_pair_survives_restart() {
    let (url, _api) = start_api(ReissueMode::Succeed, Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::load(path.clone()).await.unwrap());
    let client = AuthClient::new(ClientConfig::new(&url), store).unwrap();
    client
        .login(CredentialPair::new("at_1", "rt_1"))
        .await
        .unwrap();
    client.send(client.get("/items/a")).await.unwrap();
    drop(client);

    let reopened: Arc<dyn KeyValueStore> = Arc::new(FileStore::load(path).await.unwrap());
    let client = AuthClient::new(ClientConfig::new(&url), reopened).unwrap();

    // Already holds at_2, so the first attempt succeeds
    let response = client.send(client.get("/items/b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
