//! `/on_search` never touches `GatewayState::broker` — only `/search`'s
//! fan-out and the consumer workers do — so this round-trip can drive the
//! real axum router with `broker: None`, same as the adapter's handler
//! contract tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use beckn_auth::{build_auth_header, AuthHeaderParams};
use beckn_core::types::{Role, Subscriber, SubscriberStatus};
use beckn_middleware::MiddlewareConfig;
use ed25519_dalek::SigningKey;
use tower::ServiceExt;

use beckn_gateway::GatewayState;

struct Bpp {
    subscriber_id: String,
    unique_key_id: String,
    signing_key: SigningKey,
}

fn seed_bpp(store: &beckn_store::StoreDb, now: i64) -> Bpp {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let verifying_b64 = B64.encode(signing_key.verifying_key().to_bytes());
    let bpp = Bpp {
        subscriber_id: "bpp1.example.com".into(),
        unique_key_id: "key-1".into(),
        signing_key,
    };
    store
        .put_subscriber(&Subscriber {
            subscriber_id: bpp.subscriber_id.clone(),
            unique_key_id: bpp.unique_key_id.clone(),
            subscriber_url: "https://bpp1.example.com".into(),
            role: Role::Bpp,
            domain: "RET10".into(),
            city: "std:080".into(),
            signing_public_key: Some(verifying_b64),
            encr_public_key: None,
            status: SubscriberStatus::Subscribed,
            valid_from: Some(0),
            valid_until: Some(i64::MAX),
            is_simulated: false,
            created_at: now,
        })
        .unwrap();
    bpp
}

fn gateway_state(store: Arc<beckn_store::StoreDb>) -> GatewayState {
    GatewayState {
        store,
        signing_key: Arc::new(SigningKey::generate(&mut rand::rngs::OsRng)),
        subscriber_id: "gateway.example.com".into(),
        unique_key_id: "key-1".into(),
        domain: "RET10".into(),
        middleware_config: MiddlewareConfig::default(),
        broker: None,
        http_client: reqwest::Client::new(),
    }
}

fn on_search_body(message_id: &str) -> serde_json::Value {
    serde_json::json!({
        "context": {
            "domain": "RET10",
            "country": "IND",
            "city": "std:080",
            "action": "on_search",
            "transaction_id": "txn-1",
            "message_id": message_id,
            "bap_id": "bap1.example.com",
            "bap_uri": "https://bap1.example.com",
            "bpp_id": "bpp1.example.com",
            "bpp_uri": "https://bpp1.example.com",
            "timestamp": "2026-07-31T00:00:00Z",
        },
        "message": { "catalog": {} }
    })
}

fn signed_request(uri: &str, bpp: &Bpp, body: &serde_json::Value, now: i64) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    let header = build_auth_header(
        AuthHeaderParams {
            subscriber_id: &bpp.subscriber_id,
            unique_key_id: &bpp.unique_key_id,
            private_key: &bpp.signing_key,
            body: &bytes,
            created: None,
            validity: None,
            domain: None,
        },
        now,
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(axum::http::header::AUTHORIZATION, header)
        .body(Body::from(bytes))
        .unwrap()
}

#[tokio::test]
async fn signed_on_search_is_acked_and_logged_without_a_broker() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(beckn_store::StoreDb::open(dir.path().join("state.sled")).unwrap());
    let now = chrono::Utc::now().timestamp();
    let bpp = seed_bpp(&store, now);
    let state = gateway_state(store.clone());
    let router = beckn_gateway::router(state);

    let resp = router
        .oneshot(signed_request("/on_search", &bpp, &on_search_body("msg-1"), now))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let logged = store.get_transaction("txn-1", "msg-1", "on_search").unwrap().unwrap();
    assert_eq!(logged.status, beckn_core::types::TransactionStatus::CallbackReceived);
    assert_eq!(logged.bpp_id.as_deref(), Some("bpp1.example.com"));
}

#[tokio::test]
async fn on_search_missing_bap_uri_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(beckn_store::StoreDb::open(dir.path().join("state.sled")).unwrap());
    let now = chrono::Utc::now().timestamp();
    let bpp = seed_bpp(&store, now);
    let state = gateway_state(store);
    let router = beckn_gateway::router(state);

    let mut body = on_search_body("msg-2");
    body["context"]["bap_uri"] = serde_json::Value::Null;

    let resp = router
        .oneshot(signed_request("/on_search", &bpp, &body, now))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_without_broker_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(beckn_store::StoreDb::open(dir.path().join("state.sled")).unwrap());
    let now = chrono::Utc::now().timestamp();
    let bpp = seed_bpp(&store, now);
    let state = gateway_state(store);
    let router = beckn_gateway::router(state);

    let body = serde_json::json!({
        "context": {
            "domain": "RET10",
            "country": "IND",
            "city": "std:080",
            "action": "search",
            "transaction_id": "txn-2",
            "message_id": "msg-3",
            "bap_id": "bpp1.example.com",
            "bap_uri": "https://bpp1.example.com",
            "bpp_id": null,
            "bpp_uri": null,
            "timestamp": "2026-07-31T00:00:00Z",
        },
        "message": { "intent": {} }
    });

    let resp = router
        .oneshot(signed_request("/search", &bpp, &body, now))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
