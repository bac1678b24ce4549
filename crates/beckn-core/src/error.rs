use thiserror::Error;

/// Crate-wide error type. Variants are grouped by the subsystem that raises
/// them; `nack_code` maps an error to the wire-visible NACK code it should
/// produce when it escapes to the HTTP boundary (see `beckn-middleware`'s
/// global error handler).
#[derive(Debug, Error)]
pub enum BecknError {
    // ── Caller input ─────────────────────────────────────────────────────────
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("missing context field: {0}")]
    MissingContextField(&'static str),

    #[error("action mismatch: endpoint expects {expected}, context says {got}")]
    ActionMismatch { expected: String, got: String },

    // ── Auth ─────────────────────────────────────────────────────────────────
    #[error("missing Authorization header")]
    MissingAuthHeader,

    #[error("malformed Authorization header: {0}")]
    MalformedAuthHeader(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unknown subscriber: {subscriber_id}|{unique_key_id}")]
    UnknownSubscriber {
        subscriber_id: String,
        unique_key_id: String,
    },

    // ── Registry / subscription state machine ───────────────────────────────
    #[error("subscriber already exists: {subscriber_id}|{unique_key_id}")]
    SubscriberAlreadyExists {
        subscriber_id: String,
        unique_key_id: String,
    },

    #[error("subscriber not in expected state: need {expected}, got {got}")]
    UnexpectedSubscriberState { expected: String, got: String },

    #[error("challenge failed")]
    ChallengeFailed,

    #[error("missing key material for on_subscribe")]
    MissingKeyMaterial,

    #[error("on_subscribe decryption failed")]
    OnSubscribeFailed,

    // ── Middleware / policy ──────────────────────────────────────────────────
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("duplicate message_id")]
    DuplicateMessage,

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("finder fee metadata missing or invalid")]
    FinderFeeInvalid,

    // ── Gateway ──────────────────────────────────────────────────────────────
    #[error("no broker connection available")]
    BrokerUnavailable,

    #[error("delivery exhausted retries and was dead-lettered: {0}")]
    DeadLettered(String),

    // ── Storage / infra ───────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("outbound request failed: {0}")]
    OutboundRequest(String),

    #[error("{0}")]
    Other(String),
}

impl BecknError {
    /// Wire-visible NACK code for this error, if one is defined. Errors
    /// without an explicit code normalise to `ERR_INTERNAL` at the HTTP
    /// boundary (see `beckn-middleware::beckn_error_handler`).
    pub fn nack_code(&self) -> &'static str {
        use crate::constants::*;
        match self {
            BecknError::MalformedBody(_)
            | BecknError::MissingContextField(_)
            | BecknError::ActionMismatch { .. } => ERR_INVALID_REQUEST,

            BecknError::MissingAuthHeader
            | BecknError::MalformedAuthHeader(_)
            | BecknError::SignatureInvalid
            | BecknError::UnsupportedAlgorithm(_)
            | BecknError::UnknownSubscriber { .. } => ERR_AUTH,

            BecknError::RateLimited => ERR_RATE_LIMIT,
            BecknError::DuplicateMessage => ERR_DUPLICATE,
            BecknError::PolicyViolation(_) | BecknError::FinderFeeInvalid => ERR_POLICY,

            _ => ERR_INTERNAL,
        }
    }
}
