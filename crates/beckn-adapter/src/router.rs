use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{post, MethodRouter};
use axum::Router;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;

use beckn_core::error::BecknError;
use beckn_core::types::{Ack, Context, Role, TransactionRecord, TransactionStatus};
use beckn_middleware::{
    beckn_error_response, dedup_layer, finder_fee_validator, network_policy_layer, rate_limit_layer, MiddlewareState,
};

use crate::client::{deliver_callback, post_signed};
use crate::state::AdapterState;

const FORWARD_ACTIONS: &[&str] = &[
    "search", "select", "init", "confirm", "status", "track", "cancel", "update", "rating", "support",
];

const CALLBACK_ACTIONS: &[&str] = &[
    "on_search",
    "on_select",
    "on_init",
    "on_confirm",
    "on_status",
    "on_track",
    "on_cancel",
    "on_update",
    "on_rating",
    "on_support",
];

pub fn router(state: AdapterState) -> Router {
    let mw_state = MiddlewareState {
        store: state.store.clone(),
        config: state.middleware_config.clone(),
    };

    let mut router = Router::new().route("/initiate/:action", post(initiate));
    for action in FORWARD_ACTIONS.iter().chain(CALLBACK_ACTIONS.iter()) {
        router = router.route(&format!("/{action}"), action_handler(action));
    }

    router
        .layer(axum::middleware::from_fn_with_state(mw_state.clone(), network_policy_layer))
        .layer(axum::middleware::from_fn_with_state(mw_state.clone(), dedup_layer))
        .layer(axum::middleware::from_fn_with_state(mw_state, rate_limit_layer))
        .with_state(state)
}

fn action_handler(action: &'static str) -> MethodRouter<AdapterState> {
    post(move |state: State<AdapterState>, headers: HeaderMap, body: Bytes| handle_action(action, state, headers, body))
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

/// §4.6 steps 1–7. Steps 1-2 (raw body capture, middleware pipeline) are
/// already done by the time this handler runs: `Bytes` gives the raw
/// body and the three `tower::Layer`s above already ran.
async fn handle_action(action: &'static str, State(state): State<AdapterState>, headers: HeaderMap, body: Bytes) -> Response {
    let now = chrono::Utc::now().timestamp();

    let parsed_body: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return beckn_error_response(&BecknError::MalformedBody(e.to_string())),
    };

    // Step 4: envelope validation.
    let context_value = parsed_body.get("context").cloned().unwrap_or(serde_json::Value::Null);
    let context: Context = match serde_json::from_value(context_value.clone()) {
        Ok(c) => c,
        Err(e) => return beckn_error_response(&BecknError::MalformedBody(format!("invalid context: {e}"))),
    };
    if let Err(field) = context.validate_required() {
        return beckn_error_response(&BecknError::MissingContextField(field));
    }
    if context.action != action {
        return beckn_error_response(&BecknError::ActionMismatch {
            expected: action.to_string(),
            got: context.action.clone(),
        });
    }

    // Step 3: Authorization.
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return beckn_error_response(&BecknError::MissingAuthHeader);
    };
    let parsed_auth = match beckn_auth::parse_auth_header(auth_header) {
        Ok(p) => p,
        Err(e) => return beckn_error_response(&BecknError::MalformedAuthHeader(e.to_string())),
    };
    let pub_key_b64 = match state
        .store
        .resolve_signing_key(&parsed_auth.subscriber_id, &parsed_auth.unique_key_id, now)
    {
        Ok(Some(k)) => k,
        Ok(None) => {
            return beckn_error_response(&BecknError::UnknownSubscriber {
                subscriber_id: parsed_auth.subscriber_id.clone(),
                unique_key_id: parsed_auth.unique_key_id.clone(),
            })
        }
        Err(e) => return beckn_error_response(&e),
    };
    let verifying_key = match decode_verifying_key(&pub_key_b64) {
        Ok(k) => k,
        Err(e) => return beckn_error_response(&e),
    };
    if !beckn_auth::verify_auth_header(&parsed_auth, &body, &verifying_key, now) {
        return beckn_error_response(&BecknError::SignatureInvalid);
    }

    // Step 5: BPP-only finder-fee validation.
    if state.role == Role::Bpp {
        if let Err(e) = finder_fee_validator(action, &parsed_body, state.enforce_settlement) {
            return beckn_error_response(&e);
        }
    }

    // Step 6: transaction row, failures logged not propagated.
    let is_callback = action.starts_with("on_");
    let status = if is_callback { TransactionStatus::CallbackReceived } else { TransactionStatus::Sent };
    let record = TransactionRecord {
        transaction_id: context.transaction_id.clone(),
        message_id: context.message_id.clone(),
        action: action.to_string(),
        domain: context.domain.clone(),
        city: Some(context.city.clone()),
        bap_id: context.bap_id.clone(),
        bpp_id: context.bpp_id.clone(),
        request_body: parsed_body.clone(),
        status,
        latency_ms: None,
        recorded_at: now,
    };
    if let Err(e) = state.store.put_transaction(&record) {
        tracing::warn!(error = %e, transaction_id = %context.transaction_id, "failed to log transaction");
    }

    // Step 7: immediate ACK; callbacks terminate here, forward actions
    // spawn the async business-response + outbound `on_*` delivery.
    if !is_callback {
        let state = state.clone();
        let action_owned = action.to_string();
        tokio::spawn(deliver_callback(state, action_owned, context_value));
    }

    (StatusCode::OK, Json(Ack::ack())).into_response()
}

#[derive(Deserialize)]
struct InitiateRequest {
    target_url: String,
    body: serde_json::Value,
}

/// The client API the BAP side of §6 mentions alongside `POST
/// /on_<action>`: sign `body` with this adapter's own identity and POST
/// it to `target_url` (typically the Gateway's `/search` or a BPP's
/// `/<action>`), surfacing the downstream JSON response unchanged.
async fn initiate(State(state): State<AdapterState>, Path(action): Path<String>, Json(req): Json<InitiateRequest>) -> Response {
    match post_signed(&state, &req.target_url, &req.body).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, action, target_url = req.target_url, "outbound initiation failed");
            beckn_error_response(&e)
        }
    }
}
