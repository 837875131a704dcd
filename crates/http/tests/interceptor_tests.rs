//! Integration tests for the auth interceptor chain

use portcullis_core::{
    ManualClock, MemoryStorage, Navigator, RecordingNavigator, TokenStore,
};
use portcullis_http::{ApiClient, ApiRequest, ClientError, Method};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    tokens: TokenStore,
    navigator: Arc<RecordingNavigator>,
    client: ApiClient,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let tokens = TokenStore::with_clock(
        Arc::new(MemoryStorage::new()),
        Arc::new(ManualClock::new(0)),
    );
    let navigator = Arc::new(RecordingNavigator::new());
    let client = ApiClient::builder()
        .base_url(server.uri())
        .tokens(tokens.clone())
        .navigator(navigator.clone())
        .build()
        .unwrap();

    Harness {
        server,
        tokens,
        navigator,
        client,
    }
}

fn refresh_ok(token: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": token })))
}

#[tokio::test]
async fn test_builder_requires_base_url_and_tokens() {
    let result = ApiClient::builder()
        .tokens(TokenStore::new(Arc::new(MemoryStorage::new())))
        .build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let result = ApiClient::builder().base_url("http://localhost:1").build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_builder_trims_trailing_slash() {
    let client = ApiClient::builder()
        .base_url("http://localhost:8080/api/")
        .tokens(TokenStore::new(Arc::new(MemoryStorage::new())))
        .build()
        .unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080/api");
}

#[tokio::test]
async fn test_listing_get_never_carries_token() {
    let h = harness().await;
    h.tokens.set_access_token("valid");

    Mock::given(method("GET"))
        .and(path("/posts/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let post: Value = h.client.get("/posts/42").await.unwrap();
    assert_eq!(post["id"], 42);

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_protected_get_carries_bearer() {
    let h = harness().await;
    h.tokens.set_access_token("valid");

    Mock::given(method("GET"))
        .and(path("/characters"))
        .and(header("authorization", "Bearer valid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let characters: Vec<Value> = h.client.get("/characters").await.unwrap();
    assert!(characters.is_empty());
}

#[tokio::test]
async fn test_expired_token_is_refreshed_transparently() {
    let h = harness().await;
    h.tokens.set_access_token("stale");

    Mock::given(method("POST"))
        .and(path("/characters"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/characters"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7, "name": "hero" })))
        .expect(1)
        .mount(&h.server)
        .await;
    refresh_ok("fresh").expect(1).mount(&h.server).await;

    let created: Value = h
        .client
        .post("/characters", &json!({ "name": "hero" }))
        .await
        .unwrap();

    assert_eq!(created["id"], 7);
    assert_eq!(h.tokens.get_access_token().as_deref(), Some("fresh"));
    assert!(h.navigator.visited().is_empty());

    // The retried request carries the original body
    let requests = h.server.received_requests().await.unwrap();
    let retried = requests
        .iter()
        .rfind(|r| r.url.path() == "/characters")
        .unwrap();
    let body: Value = serde_json::from_slice(&retried.body).unwrap();
    assert_eq!(body, json!({ "name": "hero" }));
}

#[tokio::test]
async fn test_failed_refresh_ends_session() {
    let h = harness().await;
    h.tokens.set_access_token("stale");

    Mock::given(method("POST"))
        .and(path("/characters"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h
        .client
        .send(ApiRequest::post("/characters").json(&json!({})).unwrap())
        .await;

    match result {
        Err(ClientError::RefreshFailed(cause)) => assert!(cause.is_unauthorized()),
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
    assert!(h.tokens.get_access_token().is_none());
    assert_eq!(h.navigator.visited(), vec!["/auth/login"]);
}

/// Records whether a token was still stored at navigation time
struct ProbeNavigator {
    tokens: TokenStore,
    token_present: Mutex<Vec<bool>>,
}

impl Navigator for ProbeNavigator {
    fn navigate(&self, _location: &str) {
        self.token_present
            .lock()
            .unwrap()
            .push(self.tokens.get_access_token().is_some());
    }
}

#[tokio::test]
async fn test_tokens_cleared_before_navigation() {
    let server = MockServer::start().await;
    let tokens = TokenStore::new(Arc::new(MemoryStorage::new()));
    let probe = Arc::new(ProbeNavigator {
        tokens: tokens.clone(),
        token_present: Mutex::new(Vec::new()),
    });
    let client = ApiClient::builder()
        .base_url(server.uri())
        .tokens(tokens.clone())
        .navigator(probe.clone())
        .build()
        .unwrap();
    tokens.set_access_token("stale");

    Mock::given(method("DELETE"))
        .and(path("/posts/1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert!(client.delete("/posts/1").await.is_err());
    assert_eq!(*probe.token_present.lock().unwrap(), vec![false]);
}

#[tokio::test]
async fn test_second_unauthorized_is_final() {
    let h = harness().await;
    h.tokens.set_access_token("stale");

    Mock::given(method("PUT"))
        .and(path("/characters/7"))
        .respond_with(ResponseTemplate::new(401).set_body_string("still no"))
        .expect(2)
        .mount(&h.server)
        .await;
    refresh_ok("fresh").expect(1).mount(&h.server).await;

    let result: Result<Value, _> = h.client.put("/characters/7", &json!({ "hp": 3 })).await;

    assert!(matches!(result, Err(ClientError::AuthenticationFailed(ref m)) if m == "still no"));
    assert_eq!(h.tokens.get_access_token().as_deref(), Some("fresh"));
    assert!(h.navigator.visited().is_empty());
}

#[tokio::test]
async fn test_unauthorized_on_public_read_passes_through() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    refresh_ok("fresh").expect(0).mount(&h.server).await;

    let result: Result<Value, _> = h.client.get("/comments").await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_other_errors_pass_through() {
    let h = harness().await;
    h.tokens.set_access_token("valid");

    Mock::given(method("POST"))
        .and(path("/game/save"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(403).set_body_string("admins only"))
        .mount(&h.server)
        .await;
    refresh_ok("fresh").expect(0).mount(&h.server).await;

    let save: Result<Value, _> = h.client.post("/game/save", &json!({})).await;
    assert!(matches!(
        save,
        Err(ClientError::ServerError { status: 500, ref message }) if message == "disk full"
    ));

    let stats: Result<Value, _> = h.client.get("/admin/stats").await;
    assert!(matches!(stats, Err(ClientError::Forbidden(_))));
    assert_eq!(h.tokens.get_access_token().as_deref(), Some("valid"));
}

#[tokio::test]
async fn test_missing_token_recovers_through_refresh_cookie() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/characters"))
        .and(header("authorization", "Bearer minted"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/characters"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    refresh_ok("minted").expect(1).mount(&h.server).await;

    let created: Value = h.client.post("/characters", &json!({})).await.unwrap();
    assert_eq!(created["id"], 1);
}

#[tokio::test]
async fn test_concurrent_unauthorized_share_one_refresh() {
    let h = harness().await;
    h.tokens.set_access_token("stale");

    Mock::given(method("POST"))
        .and(path("/characters"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/characters"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": true })))
        .expect(3)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "fresh" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let body = json!({});
    let (a, b, c) = tokio::join!(
        h.client.post::<Value, _>("/characters", &body),
        h.client.post::<Value, _>("/characters", &body),
        h.client.post::<Value, _>("/characters", &body),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(h.tokens.get_access_token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_concurrent_unauthorized_share_one_failed_refresh() {
    let h = harness().await;
    h.tokens.set_access_token("stale");

    Mock::given(method("POST"))
        .and(path("/characters"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("refresh token revoked")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let body = json!({});
    let (a, b, c) = tokio::join!(
        h.client.post::<Value, _>("/characters", &body),
        h.client.post::<Value, _>("/characters", &body),
        h.client.post::<Value, _>("/characters", &body),
    );

    for result in [a, b, c] {
        assert!(matches!(result, Err(ClientError::RefreshFailed(_))), "{result:?}");
    }
    assert!(h.tokens.get_access_token().is_none());
    assert_eq!(h.navigator.visited(), vec!["/auth/login"]);
}

#[tokio::test]
async fn test_foreign_origin_never_receives_token() {
    let h = harness().await;
    let foreign = MockServer::start().await;
    h.tokens.set_access_token("valid");

    Mock::given(method("POST"))
        .and(path("/collect"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&foreign)
        .await;
    refresh_ok("fresh").expect(0).mount(&h.server).await;

    let url = format!("{}/collect", foreign.uri());
    assert!(!h.client.requires_auth(&Method::POST, &url));

    let err = h
        .client
        .send(ApiRequest::post(url).json(&json!({ "event": "view" })).unwrap())
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    let requests = foreign.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(h.tokens.get_access_token().as_deref(), Some("valid"));
}

#[tokio::test]
async fn test_absolute_url_on_api_origin_carries_token() {
    let h = harness().await;
    h.tokens.set_access_token("valid");

    Mock::given(method("POST"))
        .and(path("/characters"))
        .and(header("authorization", "Bearer valid"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 2 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let url = format!("{}/characters", h.server.uri());
    let created: Value = h.client.post(&url, &json!({})).await.unwrap();
    assert_eq!(created["id"], 2);
}

#[tokio::test]
async fn test_timeout_is_a_network_error() {
    let server = MockServer::start().await;
    let client = ApiClient::builder()
        .base_url(server.uri())
        .tokens(TokenStore::new(Arc::new(MemoryStorage::new())))
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client.send(ApiRequest::get("/posts")).await.unwrap_err();
    assert!(err.is_network(), "{err:?}");
}

#[tokio::test]
async fn test_extra_headers_are_forwarded() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(header("x-client", "portcullis-test"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h
        .client
        .send(ApiRequest::get("/posts").header("x-client", "portcullis-test"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
}
