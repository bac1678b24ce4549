use std::time::Duration;

use beckn_auth::{build_auth_header, AuthHeaderParams};
use beckn_core::constants::PROTOCOL_CALL_TIMEOUT_SECS;
use beckn_core::error::BecknError;
use beckn_core::types::TransactionStatus;

use crate::state::AdapterState;

/// Outbound signed client for `on_*` callbacks and peer calls: wraps the
/// body in the existing Beckn context, signs it with the local identity,
/// and POSTs with `application/json`. Grounded on the request/response
/// wrapper shape of a typed RPC client; here the envelope is Beckn
/// context + `Authorization` rather than a JSON-RPC request.
///
/// Non-200 responses are logged but the parsed JSON is still surfaced to
/// the caller — this leg makes no automatic retry.
pub async fn post_signed(
    state: &AdapterState,
    target_url: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value, BecknError> {
    let payload = serde_json::to_vec(body).map_err(|e| BecknError::Serialization(e.to_string()))?;
    let now = chrono::Utc::now().timestamp();

    let auth_header = build_auth_header(
        AuthHeaderParams {
            subscriber_id: &state.subscriber_id,
            unique_key_id: &state.unique_key_id,
            private_key: &state.signing_key,
            body: &payload,
            created: Some(now),
            validity: None,
            domain: None,
        },
        now,
    );

    let response = state
        .http_client
        .post(target_url)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .header(axum::http::header::AUTHORIZATION, auth_header)
        .timeout(Duration::from_secs(PROTOCOL_CALL_TIMEOUT_SECS))
        .body(payload)
        .send()
        .await
        .map_err(|e| BecknError::OutboundRequest(e.to_string()))?;

    let status = response.status();
    let parsed: serde_json::Value = response
        .json()
        .await
        .map_err(|e| BecknError::OutboundRequest(e.to_string()))?;

    if !status.is_success() {
        tracing::warn!(%status, url = target_url, "outbound call returned non-200");
    }

    Ok(parsed)
}

/// Builds a generic `on_*` acknowledgement echoing the originating
/// `context` unchanged but for `action`/`timestamp`/`bap_id`/`bap_uri`
/// being dropped as the BPP's own identity. Concrete order business logic
/// is out of scope here; a real BPP would plug its catalog/order engine
/// in at this seam.
fn build_callback_body(state: &AdapterState, action: &str, mut context: serde_json::Value) -> serde_json::Value {
    context["action"] = serde_json::Value::String(format!("on_{action}"));
    context["timestamp"] = serde_json::Value::String(chrono::Utc::now().to_rfc3339());
    if state.role == beckn_core::types::Role::Bpp {
        context["bpp_id"] = serde_json::Value::String(state.subscriber_id.clone());
    }
    serde_json::json!({ "context": context, "message": { "ack": { "status": "ACK" } } })
}

/// Step 7 of the adapter handler contract: asynchronously compute the
/// business response and deliver the `on_*` callback. Never run on the
/// request-handling task; errors are logged, not surfaced to the original
/// caller who has already received its synchronous ACK.
pub async fn deliver_callback(state: AdapterState, action: String, context: serde_json::Value) {
    let transaction_id = context
        .get("transaction_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let message_id = context
        .get("message_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let target_url = if state.role == beckn_core::types::Role::Bpp {
        context.get("bap_uri").and_then(|v| v.as_str()).map(|s| format!("{s}/on_{action}"))
    } else {
        None
    };

    let Some(target_url) = target_url else {
        tracing::debug!(action, transaction_id, "no callback target for this role/action, skipping delivery");
        return;
    };

    let callback_body = build_callback_body(&state, &action, context);

    match post_signed(&state, &target_url, &callback_body).await {
        Ok(_) => {
            if let Err(e) = state.store.update_transaction_status(
                &transaction_id,
                &message_id,
                &action,
                TransactionStatus::CallbackReceived,
                None,
            ) {
                tracing::warn!(error = %e, transaction_id, "failed to update transaction status after callback delivery");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, target_url, transaction_id, "callback delivery failed");
        }
    }
}
