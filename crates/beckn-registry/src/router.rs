use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use ed25519_dalek::Signer;
use serde::{Deserialize, Serialize};

use beckn_core::error::BecknError;
use beckn_core::types::{Ack, AuditRecord, Nack, Role, Subscriber, SubscriberKey, SubscriberStatus};
use beckn_middleware::beckn_error_response;

use crate::challenge::{encrypt_challenge, generate_challenge, store_challenge, verify_challenge};
use crate::state::RegistryState;

pub fn router(state: RegistryState) -> Router {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/on_subscribe", post(on_subscribe))
        .route("/ondc/on_subscribe", post(ondc_on_subscribe))
        .route("/lookup", get(lookup))
        .route("/ondc-site-verification.html", get(site_verification))
        .route("/subscribers/:subscriber_id/:unique_key_id/status", post(set_subscriber_status))
        .with_state(state)
}

#[derive(Deserialize)]
struct SubscribeRequest {
    subscriber_id: String,
    unique_key_id: String,
    subscriber_url: String,
    role: Role,
    domain: String,
    city: String,
    signing_public_key: String,
    encr_public_key: String,
}

#[derive(Serialize)]
struct SubscribeResponse {
    challenge: String,
}

async fn subscribe(State(state): State<RegistryState>, Json(req): Json<SubscribeRequest>) -> Response {
    let now = chrono::Utc::now().timestamp();

    let encr_pub_bytes = match B64.decode(&req.encr_public_key) {
        Ok(b) if b.len() == 32 => b,
        _ => {
            return beckn_error_response(&BecknError::MalformedBody("encr_public_key must decode to 32 bytes".into()))
        }
    };
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&encr_pub_bytes);
    let recipient_pub = x25519_dalek::PublicKey::from(arr);

    let subscriber = Subscriber {
        subscriber_id: req.subscriber_id.clone(),
        unique_key_id: req.unique_key_id.clone(),
        subscriber_url: req.subscriber_url,
        role: req.role,
        domain: req.domain,
        city: req.city,
        signing_public_key: Some(req.signing_public_key),
        encr_public_key: Some(req.encr_public_key),
        status: SubscriberStatus::UnderSubscription,
        valid_from: None,
        valid_until: None,
        is_simulated: false,
        created_at: now,
    };

    if let Err(e) = state.store.put_subscriber(&subscriber) {
        return beckn_error_response(&e);
    }
    if let Err(e) = state.store.invalidate_key(&req.subscriber_id, &req.unique_key_id) {
        return beckn_error_response(&e);
    }

    let challenge = generate_challenge();
    if let Err(e) = store_challenge(&state.store, &req.subscriber_id, &challenge, now) {
        return beckn_error_response(&e);
    }
    let encrypted = encrypt_challenge(&challenge, &recipient_pub);

    (StatusCode::OK, Json(SubscribeResponse { challenge: encrypted })).into_response()
}

#[derive(Deserialize)]
struct OnSubscribeRequest {
    subscriber_id: String,
    unique_key_id: String,
    answer: String,
}

async fn on_subscribe(State(state): State<RegistryState>, Json(req): Json<OnSubscribeRequest>) -> Response {
    let now = chrono::Utc::now().timestamp();
    let key = SubscriberKey::new(req.subscriber_id.clone(), req.unique_key_id.clone());

    let Ok(Some(mut subscriber)) = state.store.get_subscriber(&key) else {
        return beckn_error_response(&BecknError::UnknownSubscriber {
            subscriber_id: req.subscriber_id,
            unique_key_id: req.unique_key_id,
        });
    };

    if subscriber.status != SubscriberStatus::UnderSubscription {
        return beckn_error_response(&BecknError::UnexpectedSubscriberState {
            expected: "UNDER_SUBSCRIPTION".into(),
            got: format!("{:?}", subscriber.status),
        });
    }

    if !verify_challenge(&state.store, &req.subscriber_id, &req.answer, now) {
        let _ = state.store.append_audit(&AuditRecord {
            actor: req.subscriber_id.clone(),
            action: "SUBSCRIBE_CHALLENGE_FAILED".into(),
            resource_type: "subscriber".into(),
            resource_id: key.storage_key(),
            details: serde_json::json!({}),
            ip: None,
            timestamp: now,
        });
        return (
            StatusCode::UNAUTHORIZED,
            Json(Nack::new("CHALLENGE-ERROR", "CHALLENGE_FAILED", "challenge verification failed")),
        )
            .into_response();
    }

    subscriber.status = SubscriberStatus::Subscribed;
    subscriber.valid_from = Some(now);
    subscriber.valid_until = Some(now + beckn_core::constants::SUBSCRIPTION_VALIDITY_SECS);

    if let Err(e) = state.store.put_subscriber(&subscriber) {
        return beckn_error_response(&e);
    }
    if let Err(e) = state.store.invalidate_key(&req.subscriber_id, &req.unique_key_id) {
        return beckn_error_response(&e);
    }
    let _ = state.store.append_audit(&AuditRecord {
        actor: req.subscriber_id,
        action: "SUBSCRIBE_COMPLETED".into(),
        resource_type: "subscriber".into(),
        resource_id: key.storage_key(),
        details: serde_json::json!({}),
        ip: None,
        timestamp: now,
    });

    (StatusCode::OK, Json(Ack::ack())).into_response()
}

#[derive(Deserialize)]
struct OndcOnSubscribeRequest {
    challenge: String,
}

#[derive(Serialize)]
struct OndcOnSubscribeResponse {
    answer: String,
}

/// The peer role of `/on_subscribe`: decrypt the inbound challenge with
/// this deployment's own X25519 private key and return the plaintext.
async fn ondc_on_subscribe(State(state): State<RegistryState>, Json(req): Json<OndcOnSubscribeRequest>) -> Response {
    let Some(secret) = &state.x25519_secret else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Nack::new("CORE-ERROR", "MISSING_KEY", "no X25519 key material configured")),
        )
            .into_response();
    };

    match beckn_crypto::decrypt(&req.challenge, secret) {
        Ok(answer) => (StatusCode::OK, Json(OndcOnSubscribeResponse { answer })).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Nack::new("CORE-ERROR", "ON_SUBSCRIBE_FAILED", "challenge decryption failed")),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct LookupQuery {
    subscriber_id: Option<String>,
    domain: Option<String>,
    city: Option<String>,
}

async fn lookup(State(state): State<RegistryState>, Query(q): Query<LookupQuery>) -> Response {
    let all = match state.store.iter_subscribers() {
        Ok(v) => v,
        Err(e) => return beckn_error_response(&e),
    };

    let matches: Vec<Subscriber> = all
        .into_iter()
        .filter(|s| q.subscriber_id.as_deref().is_none_or(|v| v == s.subscriber_id))
        .filter(|s| q.domain.as_deref().is_none_or(|v| v == s.domain))
        .filter(|s| q.city.as_deref().is_none_or(|v| v == s.city || s.city == "*"))
        .collect();

    Json(matches).into_response()
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: SubscriberStatus,
}

/// Admin transition `SUBSCRIBED -> {SUSPENDED, REVOKED}`. Only these two
/// targets are accepted — the subscribe/on_subscribe handshake above owns
/// every other transition in the state machine.
async fn set_subscriber_status(
    State(state): State<RegistryState>,
    Path((subscriber_id, unique_key_id)): Path<(String, String)>,
    Json(req): Json<SetStatusRequest>,
) -> Response {
    if !matches!(req.status, SubscriberStatus::Suspended | SubscriberStatus::Revoked) {
        return beckn_error_response(&BecknError::UnexpectedSubscriberState {
            expected: "SUSPENDED or REVOKED".into(),
            got: format!("{:?}", req.status),
        });
    }

    let key = SubscriberKey::new(subscriber_id.clone(), unique_key_id.clone());
    let Ok(Some(mut subscriber)) = state.store.get_subscriber(&key) else {
        return beckn_error_response(&BecknError::UnknownSubscriber {
            subscriber_id,
            unique_key_id,
        });
    };

    if subscriber.status.is_terminal() {
        return beckn_error_response(&BecknError::UnexpectedSubscriberState {
            expected: "non-terminal".into(),
            got: format!("{:?}", subscriber.status),
        });
    }

    let now = chrono::Utc::now().timestamp();
    let new_status = req.status;
    subscriber.status = new_status;

    if let Err(e) = state.store.put_subscriber(&subscriber) {
        return beckn_error_response(&e);
    }
    if let Err(e) = state.store.invalidate_key(&subscriber_id, &unique_key_id) {
        return beckn_error_response(&e);
    }
    let _ = state.store.append_audit(&AuditRecord {
        actor: subscriber_id,
        action: format!("SUBSCRIBER_{:?}", new_status).to_uppercase(),
        resource_type: "subscriber".into(),
        resource_id: key.storage_key(),
        details: serde_json::json!({}),
        ip: None,
        timestamp: now,
    });

    (StatusCode::OK, Json(Ack::ack())).into_response()
}

async fn site_verification(State(state): State<RegistryState>) -> impl IntoResponse {
    let signature = state.signing_key.sign(state.site_verification_request_id.as_bytes());
    let sig_b64 = B64.encode(signature.to_bytes());
    Html(format!(
        "<html><head><meta name=\"ondc-site-verification\" content=\"{sig_b64}\" /></head><body></body></html>"
    ))
}
