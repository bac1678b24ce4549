//! Drives the full `/subscribe -> /on_subscribe -> /lookup` state machine
//! through the real axum router (no process spawn — sled only tolerates a
//! single writer, so every integration test here shares one in-process
//! `RegistryState`).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use ed25519_dalek::SigningKey;
use tower::ServiceExt;
use x25519_dalek::{PublicKey, StaticSecret};

use beckn_registry::RegistryState;

fn temp_state() -> RegistryState {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(beckn_store::StoreDb::open(dir.path().join("state.sled")).unwrap());
    RegistryState {
        store,
        signing_key: Arc::new(SigningKey::generate(&mut rand::rngs::OsRng)),
        x25519_secret: Some(Arc::new(StaticSecret::random_from_rng(rand::rngs::OsRng))),
        site_verification_request_id: "req-123".into(),
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn subscribe_on_subscribe_lookup_round_trip() {
    let state = temp_state();
    let bpp_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
    let bpp_public = PublicKey::from(&bpp_secret);

    let subscribe_body = serde_json::json!({
        "subscriber_id": "bpp1.example.com",
        "unique_key_id": "key-1",
        "subscriber_url": "https://bpp1.example.com",
        "role": "BPP",
        "domain": "RET10",
        "city": "std:080",
        "signing_public_key": B64.encode([1u8; 32]),
        "encr_public_key": B64.encode(bpp_public.to_bytes()),
    });

    let router = beckn_registry::router(state.clone());
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/subscribe")
                .header("content-type", "application/json")
                .body(Body::from(subscribe_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    let encrypted_challenge = json["challenge"].as_str().unwrap().to_string();

    let key = beckn_core::types::SubscriberKey::new("bpp1.example.com", "key-1");
    let pending = state.store.get_subscriber(&key).unwrap().unwrap();
    assert_eq!(pending.status, beckn_core::types::SubscriberStatus::UnderSubscription);

    let answer = beckn_crypto::decrypt(&encrypted_challenge, &bpp_secret).unwrap();

    let on_subscribe_body = serde_json::json!({
        "subscriber_id": "bpp1.example.com",
        "unique_key_id": "key-1",
        "answer": answer,
    });
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/on_subscribe")
                .header("content-type", "application/json")
                .body(Body::from(on_subscribe_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let active = state.store.get_subscriber(&key).unwrap().unwrap();
    assert_eq!(active.status, beckn_core::types::SubscriberStatus::Subscribed);

    let resp = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/lookup?domain=RET10&city=std:080")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let matches = body_json(resp).await;
    assert_eq!(matches.as_array().unwrap().len(), 1);
    assert_eq!(matches[0]["subscriber_id"], "bpp1.example.com");
}

#[tokio::test]
async fn on_subscribe_rejects_wrong_answer() {
    let state = temp_state();
    let bpp_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
    let bpp_public = PublicKey::from(&bpp_secret);

    let subscribe_body = serde_json::json!({
        "subscriber_id": "bpp2.example.com",
        "unique_key_id": "key-1",
        "subscriber_url": "https://bpp2.example.com",
        "role": "BPP",
        "domain": "RET10",
        "city": "std:080",
        "signing_public_key": B64.encode([2u8; 32]),
        "encr_public_key": B64.encode(bpp_public.to_bytes()),
    });

    let router = beckn_registry::router(state.clone());
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/subscribe")
                .header("content-type", "application/json")
                .body(Body::from(subscribe_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let on_subscribe_body = serde_json::json!({
        "subscriber_id": "bpp2.example.com",
        "unique_key_id": "key-1",
        "answer": "not-the-answer",
    });
    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/on_subscribe")
                .header("content-type", "application/json")
                .body(Body::from(on_subscribe_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let key = beckn_core::types::SubscriberKey::new("bpp2.example.com", "key-1");
    let still_pending = state.store.get_subscriber(&key).unwrap().unwrap();
    assert_eq!(still_pending.status, beckn_core::types::SubscriberStatus::UnderSubscription);
}

#[tokio::test]
async fn admin_can_suspend_and_revoke_a_subscribed_subscriber() {
    let state = temp_state();
    let key = beckn_core::types::SubscriberKey::new("bpp3.example.com", "key-1");
    state
        .store
        .put_subscriber(&beckn_core::types::Subscriber {
            subscriber_id: "bpp3.example.com".into(),
            unique_key_id: "key-1".into(),
            subscriber_url: "https://bpp3.example.com".into(),
            role: beckn_core::types::Role::Bpp,
            domain: "RET10".into(),
            city: "std:080".into(),
            signing_public_key: Some(B64.encode([3u8; 32])),
            encr_public_key: None,
            status: beckn_core::types::SubscriberStatus::Subscribed,
            valid_from: Some(0),
            valid_until: Some(i64::MAX),
            is_simulated: false,
            created_at: 0,
        })
        .unwrap();
    state.store.resolve_signing_key("bpp3.example.com", "key-1", 0).unwrap();

    let router = beckn_registry::router(state.clone());
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/subscribers/bpp3.example.com/key-1/status")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({ "status": "SUSPENDED" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let suspended = state.store.get_subscriber(&key).unwrap().unwrap();
    assert_eq!(suspended.status, beckn_core::types::SubscriberStatus::Suspended);
    assert!(state.store.shared().get_cached_pubkey("bpp3.example.com", "key-1", 1).unwrap().is_none());

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/subscribers/bpp3.example.com/key-1/status")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({ "status": "REVOKED" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let revoked = state.store.get_subscriber(&key).unwrap().unwrap();
    assert_eq!(revoked.status, beckn_core::types::SubscriberStatus::Revoked);
}
