use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use beckn_store::StoreDb;
use tracing::warn;

use crate::error::beckn_error_response;
use beckn_core::error::BecknError;

/// Enforcement/window configuration shared by the pipeline stages.
#[derive(Clone, Debug)]
pub struct MiddlewareConfig {
    pub rate_limit_max: u64,
    pub rate_limit_window_secs: i64,
    pub enforce_sla: bool,
    pub enforce_tags: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            rate_limit_max: 100,
            rate_limit_window_secs: 60,
            enforce_sla: false,
            enforce_tags: false,
        }
    }
}

#[derive(Clone)]
pub struct MiddlewareState {
    pub store: Arc<StoreDb>,
    pub config: MiddlewareConfig,
}

/// Parsed fields the pipeline needs out of the request, read once and
/// reattached to the request so downstream handlers still see the raw body.
struct BodyPeek {
    bap_id: Option<String>,
    message_id: Option<String>,
    action: Option<String>,
}

fn peek_body(bytes: &[u8]) -> BodyPeek {
    let value: Option<serde_json::Value> = serde_json::from_slice(bytes).ok();
    let context = value.as_ref().and_then(|v| v.get("context"));
    BodyPeek {
        bap_id: context
            .and_then(|c| c.get("bap_id"))
            .and_then(|v| v.as_str())
            .map(String::from),
        message_id: context
            .and_then(|c| c.get("message_id"))
            .and_then(|v| v.as_str())
            .map(String::from),
        action: context
            .and_then(|c| c.get("action"))
            .and_then(|v| v.as_str())
            .map(String::from),
    }
}

fn subscriber_id_from_auth_header(req: &Request<Body>) -> Option<String> {
    let header = req.headers().get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let parsed = beckn_auth::parse_auth_header(header).ok()?;
    Some(parsed.subscriber_id)
}

async fn buffer_body(req: Request<Body>) -> Result<(BodyPeek, Request<Body>), Response> {
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            return Err(beckn_error_response(&BecknError::MalformedBody(e.to_string())));
        }
    };
    let peek = peek_body(&bytes);
    let req = Request::from_parts(parts, Body::from(bytes));
    Ok((peek, req))
}

/// Stage 1: per-caller sliding-window rate limit. Caller identity is taken
/// from `context.bap_id`, else the `Authorization` keyId's subscriber
/// prefix, else the remote IP. Fails open on shared-storage faults.
pub async fn rate_limit_layer(
    State(state): State<MiddlewareState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (peek, req) = match buffer_body(req).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let caller_id = peek
        .bap_id
        .clone()
        .or_else(|| subscriber_id_from_auth_header(&req))
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    let now = chrono::Utc::now().timestamp();
    match state
        .store
        .shared()
        .incr_rate_counter(&caller_id, now, state.config.rate_limit_window_secs)
    {
        Ok((count, reset_at)) => {
            let mut response = if count > state.config.rate_limit_max {
                beckn_error_response(&BecknError::RateLimited)
            } else {
                next.run(req).await
            };
            let remaining = state.config.rate_limit_max.saturating_sub(count);
            let headers = response.headers_mut();
            headers.insert(
                "X-RateLimit-Limit",
                HeaderValue::from_str(&state.config.rate_limit_max.to_string()).unwrap(),
            );
            headers.insert(
                "X-RateLimit-Remaining",
                HeaderValue::from_str(&remaining.to_string()).unwrap(),
            );
            headers.insert(
                "X-RateLimit-Reset",
                HeaderValue::from_str(&reset_at.to_string()).unwrap(),
            );
            response
        }
        Err(e) => {
            warn!(error = %e, caller_id, "rate limiter storage fault, failing open");
            next.run(req).await
        }
    }
}

/// Stage 2: suppress a `message_id` already seen, except for `on_*`
/// callbacks which legitimately reuse the originating `message_id`. Fails
/// open on shared-storage faults.
pub async fn dedup_layer(State(state): State<MiddlewareState>, req: Request<Body>, next: Next) -> Response {
    let (peek, req) = match buffer_body(req).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(message_id) = peek.message_id.clone() else {
        return next.run(req).await;
    };
    let action = peek.action.clone().unwrap_or_default();
    if action.starts_with("on_") {
        return next.run(req).await;
    }

    let now = chrono::Utc::now().timestamp();
    match state.store.shared().dedup_exists(&message_id, now) {
        Ok(true) => beckn_error_response(&BecknError::DuplicateMessage),
        Ok(false) => {
            if let Err(e) = state.store.shared().dedup_insert(&message_id, &action, now) {
                warn!(error = %e, message_id, "dedup insert failed, failing open");
            }
            next.run(req).await
        }
        Err(e) => {
            warn!(error = %e, message_id, "dedup storage fault, failing open");
            next.run(req).await
        }
    }
}
