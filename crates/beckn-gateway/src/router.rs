use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use ed25519_dalek::VerifyingKey;

use beckn_auth::{build_auth_header, AuthHeaderParams};
use beckn_core::error::BecknError;
use beckn_core::types::{Ack, Context, Subscriber, TransactionRecord, TransactionStatus};
use beckn_middleware::{beckn_error_response, dedup_layer, network_policy_layer, rate_limit_layer, MiddlewareState};

use crate::broker::{self, SEARCH_ROUTING_KEY};
use crate::state::GatewayState;
use crate::worker::FanoutMessage;

pub fn router(state: GatewayState) -> Router {
    let mw_state = MiddlewareState {
        store: state.store.clone(),
        config: state.middleware_config.clone(),
    };

    Router::new()
        .route("/search", post(search))
        .route("/on_search", post(on_search))
        .layer(axum::middleware::from_fn_with_state(mw_state.clone(), network_policy_layer))
        .layer(axum::middleware::from_fn_with_state(mw_state.clone(), dedup_layer))
        .layer(axum::middleware::from_fn_with_state(mw_state, rate_limit_layer))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn decode_verifying_key(b64: &str) -> Result<VerifyingKey, BecknError> {
    let bytes = B64
        .decode(b64)
        .map_err(|e| BecknError::MalformedAuthHeader(format!("signing_public_key not valid base64: {e}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| BecknError::MalformedAuthHeader("signing_public_key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| BecknError::MalformedAuthHeader(e.to_string()))
}

/// Shared by `/search` and `/on_search`: parse + verify the envelope and
/// the caller's signature, returning the parsed body/context on success.
async fn verify_and_parse(
    state: &GatewayState,
    headers: &HeaderMap,
    body: &[u8],
    expected_action: &str,
) -> Result<(serde_json::Value, Context), BecknError> {
    let now = chrono::Utc::now().timestamp();

    let parsed_body: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| BecknError::MalformedBody(e.to_string()))?;
    let context: Context = serde_json::from_value(parsed_body.get("context").cloned().unwrap_or_default())
        .map_err(|e| BecknError::MalformedBody(format!("invalid context: {e}")))?;
    context.validate_required().map_err(BecknError::MissingContextField)?;
    if context.action != expected_action {
        return Err(BecknError::ActionMismatch {
            expected: expected_action.to_string(),
            got: context.action.clone(),
        });
    }

    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(BecknError::MissingAuthHeader)?;
    let parsed_auth = beckn_auth::parse_auth_header(auth_header).map_err(|e| BecknError::MalformedAuthHeader(e.to_string()))?;
    let pub_key_b64 = state
        .store
        .resolve_signing_key(&parsed_auth.subscriber_id, &parsed_auth.unique_key_id, now)?
        .ok_or_else(|| BecknError::UnknownSubscriber {
            subscriber_id: parsed_auth.subscriber_id.clone(),
            unique_key_id: parsed_auth.unique_key_id.clone(),
        })?;
    let verifying_key = decode_verifying_key(&pub_key_b64)?;
    if !beckn_auth::verify_auth_header(&parsed_auth, body, &verifying_key, now) {
        return Err(BecknError::SignatureInvalid);
    }

    Ok((parsed_body, context))
}

/// §4.7 `/search`: verify, validate, discover, multicast, log, ack.
async fn search(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    let now = chrono::Utc::now().timestamp();

    let (parsed_body, context) = match verify_and_parse(&state, &headers, &body, "search").await {
        Ok(v) => v,
        Err(e) => return beckn_error_response(&e),
    };

    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let Some(broker) = state.broker.as_ref() else {
        return beckn_error_response(&BecknError::BrokerUnavailable);
    };

    // Step 3: discovery.
    let targets = match discover(&state, &context, now) {
        Ok(t) => t,
        Err(e) => return beckn_error_response(&e),
    };

    // Step 4: multicast, per-target, confirm-mode publish. A single target's
    // publish failing must not drop the others, so failures are logged and
    // counted rather than aborting the loop.
    let mut publish_failures = 0usize;
    for target in &targets {
        let msg = FanoutMessage {
            bpp_url: target.subscriber_url.clone(),
            body: parsed_body.clone(),
            bap_auth_header: auth_header.clone(),
            transaction_id: context.transaction_id.clone(),
            message_id: context.message_id.clone(),
        };
        let Ok(payload) = serde_json::to_vec(&msg) else {
            publish_failures += 1;
            continue;
        };
        if let Err(e) = broker::publish(broker, SEARCH_ROUTING_KEY, &payload).await {
            tracing::warn!(error = %e, bpp = target.subscriber_id, "failed to publish fan-out message");
            publish_failures += 1;
        }
    }
    if !targets.is_empty() && publish_failures == targets.len() {
        return beckn_error_response(&BecknError::BrokerUnavailable);
    }

    // Step 5: log transaction, bpp_id=NULL.
    let record = TransactionRecord {
        transaction_id: context.transaction_id.clone(),
        message_id: context.message_id.clone(),
        action: "search".to_string(),
        domain: context.domain.clone(),
        city: Some(context.city.clone()),
        bap_id: context.bap_id.clone(),
        bpp_id: None,
        request_body: parsed_body,
        status: TransactionStatus::Sent,
        latency_ms: None,
        recorded_at: now,
    };
    if let Err(e) = state.store.put_transaction(&record) {
        tracing::warn!(error = %e, transaction_id = %context.transaction_id, "failed to log transaction");
    }

    (StatusCode::OK, Json(Ack::ack())).into_response()
}

/// Discovery query: `status=SUBSCRIBED ∧ domain=context.domain ∧ city ∈
/// {context.city, "*"}` (§4.7 step 3, §9 canonical wildcard decision).
fn discover(state: &GatewayState, context: &Context, now: i64) -> Result<Vec<Subscriber>, BecknError> {
    Ok(filter_discoverable(state.store.iter_subscribers()?, &context.domain, &context.city, now))
}

fn filter_discoverable(subscribers: Vec<Subscriber>, domain: &str, city: &str, now: i64) -> Vec<Subscriber> {
    subscribers
        .into_iter()
        .filter(|s| s.is_active_at(now))
        .filter(|s| s.domain == domain)
        .filter(|s| s.city == city || s.city == "*")
        .collect()
}

/// §4.7 `/on_search`: verify, validate, fire-and-forget relay, log, ack.
async fn on_search(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    let receive_time = chrono::Utc::now().timestamp();

    let (parsed_body, context) = match verify_and_parse(&state, &headers, &body, "on_search").await {
        Ok(v) => v,
        Err(e) => return beckn_error_response(&e),
    };

    // bap_uri presence already enforced by verify_and_parse's validate_required call.
    let bap_uri = context.bap_uri.clone().unwrap_or_default();

    // Step 3: fire-and-forget relay, re-signed with Gateway identity.
    let relay_state = state.clone();
    let relay_body = parsed_body.clone();
    tokio::spawn(async move { relay(relay_state, bap_uri, relay_body).await });

    // Step 4: log transaction, latency from now this call started.
    let latency_ms = (chrono::Utc::now().timestamp() - receive_time).max(0) as u64 * 1000;
    let record = TransactionRecord {
        transaction_id: context.transaction_id.clone(),
        message_id: context.message_id.clone(),
        action: "on_search".to_string(),
        domain: context.domain.clone(),
        city: Some(context.city.clone()),
        bap_id: context.bap_id.clone(),
        bpp_id: context.bpp_id.clone(),
        request_body: parsed_body,
        status: TransactionStatus::CallbackReceived,
        latency_ms: Some(latency_ms),
        recorded_at: receive_time,
    };
    if let Err(e) = state.store.put_transaction(&record) {
        tracing::warn!(error = %e, transaction_id = %context.transaction_id, "failed to log transaction");
    }

    (StatusCode::OK, Json(Ack::ack())).into_response()
}

async fn relay(state: GatewayState, bap_uri: String, body: serde_json::Value) {
    let Ok(payload) = serde_json::to_vec(&body) else { return };
    let now = chrono::Utc::now().timestamp();
    let auth_header = build_auth_header(
        AuthHeaderParams {
            subscriber_id: &state.subscriber_id,
            unique_key_id: &state.unique_key_id,
            private_key: &state.signing_key,
            body: &payload,
            created: Some(now),
            validity: None,
            domain: Some(&state.domain),
        },
        now,
    );

    let target = format!("{}/on_search", bap_uri.trim_end_matches('/'));
    let response = state
        .http_client
        .post(&target)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .header(axum::http::header::AUTHORIZATION, auth_header)
        .body(payload)
        .send()
        .await;

    match response {
        Ok(r) if r.status().is_success() => {}
        Ok(r) => tracing::warn!(status = %r.status(), target, "on_search relay returned non-200"),
        Err(e) => tracing::warn!(error = %e, target, "on_search relay failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beckn_core::types::Role;

    fn sub(domain: &str, city: &str, active: bool) -> Subscriber {
        Subscriber {
            subscriber_id: format!("{domain}-{city}"),
            unique_key_id: "k1".into(),
            subscriber_url: "https://example.com".into(),
            role: Role::Bpp,
            domain: domain.into(),
            city: city.into(),
            signing_public_key: Some("pub".into()),
            encr_public_key: None,
            status: if active {
                beckn_core::types::SubscriberStatus::Subscribed
            } else {
                beckn_core::types::SubscriberStatus::Suspended
            },
            valid_from: Some(0),
            valid_until: Some(i64::MAX),
            is_simulated: false,
            created_at: 0,
        }
    }

    #[test]
    fn filter_discoverable_matches_domain_and_exact_city() {
        let subs = vec![sub("RET10", "std:080", true), sub("RET10", "std:011", true)];
        let matches = filter_discoverable(subs, "RET10", "std:080", 1000);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].city, "std:080");
    }

    #[test]
    fn filter_discoverable_includes_wildcard_city() {
        let subs = vec![sub("RET10", "*", true)];
        let matches = filter_discoverable(subs, "RET10", "std:080", 1000);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn filter_discoverable_excludes_other_domain() {
        let subs = vec![sub("RET11", "std:080", true)];
        assert!(filter_discoverable(subs, "RET10", "std:080", 1000).is_empty());
    }

    #[test]
    fn filter_discoverable_excludes_inactive_subscriber() {
        let subs = vec![sub("RET10", "std:080", false)];
        assert!(filter_discoverable(subs, "RET10", "std:080", 1000).is_empty());
    }
}
