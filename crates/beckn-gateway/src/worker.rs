use std::time::Duration;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::FieldTable;
use serde::{Deserialize, Serialize};

use beckn_auth::{build_auth_header, AuthHeaderParams};
use beckn_core::constants::{GATEWAY_MAX_ATTEMPTS, GATEWAY_RETRY_BACKOFF_SECS, PROTOCOL_CALL_TIMEOUT_SECS};

use crate::broker;
use crate::state::GatewayState;

/// One queued fan-out delivery: the target BPP, the original (BAP-signed)
/// body, and enough context to log a dead-letter entry if delivery is
/// ultimately abandoned. The Gateway's own key material is never queued
/// — the worker re-signs using the identity already in `GatewayState`.
#[derive(Clone, Serialize, Deserialize)]
pub struct FanoutMessage {
    pub bpp_url: String,
    pub body: serde_json::Value,
    pub bap_auth_header: String,
    pub transaction_id: String,
    pub message_id: String,
}

/// Spawn `worker_count` parallel consumers pulling from the shared work
/// queue. Each delivery is acked immediately on dequeue; the bounded
/// exponential-backoff retry loop then runs in-process so broker-level
/// redelivery semantics stay simple (retries are idempotent — the BPP is
/// expected to dedup by `message_id`, per §4.7).
pub fn spawn_workers(state: GatewayState, worker_count: usize) {
    for worker_id in 0..worker_count {
        let state = state.clone();
        tokio::spawn(async move { run_worker(state, worker_id).await });
    }
}

async fn run_worker(state: GatewayState, worker_id: usize) {
    let Some(broker) = state.broker.as_ref() else {
        tracing::error!(worker_id, "no broker connection, worker exiting");
        return;
    };
    let consumer_tag = format!("gateway-worker-{worker_id}");
    let mut consumer = match broker
        .basic_consume(
            broker::SEARCH_QUEUE,
            &consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, worker_id, "failed to start consuming, worker exiting");
            return;
        }
    };

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, worker_id, "consumer stream error");
                continue;
            }
        };

        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            tracing::warn!(error = %e, worker_id, "failed to ack delivery");
        }

        let Ok(msg) = serde_json::from_slice::<FanoutMessage>(&delivery.data) else {
            tracing::warn!(worker_id, "failed to decode fan-out message, dropping");
            continue;
        };

        let state = state.clone();
        tokio::spawn(async move { deliver_with_retry(state, msg).await });
    }
}

#[derive(Debug, PartialEq, Eq)]
enum DeliverOutcome {
    Delivered,
    Permanent,
    Transient,
}

async fn deliver_once(state: &GatewayState, msg: &FanoutMessage) -> DeliverOutcome {
    let payload = match serde_json::to_vec(&msg.body) {
        Ok(p) => p,
        Err(_) => return DeliverOutcome::Permanent,
    };
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

    let target = format!("{}/search", msg.bpp_url.trim_end_matches('/'));
    let response = state
        .http_client
        .post(&target)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .header(axum::http::header::AUTHORIZATION, auth_header)
        .timeout(Duration::from_secs(PROTOCOL_CALL_TIMEOUT_SECS))
        .body(payload)
        .send()
        .await;

    let Ok(response) = response else {
        return DeliverOutcome::Transient;
    };
    let status = response.status();
    let body: Option<serde_json::Value> = response.json().await.ok();
    classify_response(status, body.as_ref())
}

/// A non-2xx response is only a permanent (non-retryable) failure when
/// the BPP NACKed with `error.type=POLICY-ERROR` — everything else
/// (timeouts, connection resets, 5xx, other NACK kinds) is transient.
fn classify_response(status: reqwest::StatusCode, body: Option<&serde_json::Value>) -> DeliverOutcome {
    if status.is_success() {
        return DeliverOutcome::Delivered;
    }

    let is_policy_error =
        body.and_then(|b| b.get("error")).and_then(|e| e.get("type")).and_then(|t| t.as_str()) == Some("POLICY-ERROR");

    if is_policy_error {
        DeliverOutcome::Permanent
    } else {
        DeliverOutcome::Transient
    }
}

async fn deliver_with_retry(state: GatewayState, msg: FanoutMessage) {
    let mut attempt: u32 = 1;
    loop {
        match deliver_once(&state, &msg).await {
            DeliverOutcome::Delivered => return,
            DeliverOutcome::Permanent => {
                tracing::info!(bpp_url = msg.bpp_url, transaction_id = msg.transaction_id, "permanent policy NACK, not retrying");
                return;
            }
            DeliverOutcome::Transient => {
                if attempt >= GATEWAY_MAX_ATTEMPTS {
                    tracing::error!(
                        bpp_url = msg.bpp_url,
                        transaction_id = msg.transaction_id,
                        "delivery exhausted retries, dead-lettering"
                    );
                    if let (Ok(payload), Some(broker)) = (serde_json::to_vec(&msg), state.broker.as_ref()) {
                        broker::publish_dead_letter(broker, &payload).await;
                    }
                    return;
                }
                let backoff = GATEWAY_RETRY_BACKOFF_SECS[(attempt - 1) as usize];
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_is_delivered() {
        let outcome = classify_response(reqwest::StatusCode::OK, None);
        assert_eq!(outcome, DeliverOutcome::Delivered);
    }

    #[test]
    fn policy_error_nack_is_permanent() {
        let body = serde_json::json!({ "error": { "type": "POLICY-ERROR", "code": "40001" } });
        let outcome = classify_response(reqwest::StatusCode::BAD_REQUEST, Some(&body));
        assert_eq!(outcome, DeliverOutcome::Permanent);
    }

    #[test]
    fn other_nack_kind_is_transient() {
        let body = serde_json::json!({ "error": { "type": "CONTEXT-ERROR", "code": "40002" } });
        let outcome = classify_response(reqwest::StatusCode::BAD_REQUEST, Some(&body));
        assert_eq!(outcome, DeliverOutcome::Transient);
    }

    #[test]
    fn non_200_with_no_body_is_transient() {
        let outcome = classify_response(reqwest::StatusCode::INTERNAL_SERVER_ERROR, None);
        assert_eq!(outcome, DeliverOutcome::Transient);
    }

    /// `deliver_with_retry` sleeps between attempts 1..GATEWAY_MAX_ATTEMPTS,
    /// indexing the backoff table at `attempt - 1` for attempt in
    /// `1..GATEWAY_MAX_ATTEMPTS` — the table must cover that range.
    #[test]
    fn backoff_table_covers_every_retry_index() {
        assert!(GATEWAY_RETRY_BACKOFF_SECS.len() as u32 >= GATEWAY_MAX_ATTEMPTS - 1);
    }
}
