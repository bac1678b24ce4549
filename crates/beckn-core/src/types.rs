use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── Role ─────────────────────────────────────────────────────────────────────

/// Subscriber role on the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Buyer-side network adapter.
    Bap,
    /// Seller-side network adapter.
    Bpp,
    /// Gateway-class participant.
    Bg,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Bap => "BAP",
            Role::Bpp => "BPP",
            Role::Bg => "BG",
        };
        write!(f, "{s}")
    }
}

// ── Subscriber lifecycle ─────────────────────────────────────────────────────

/// States of the subscriber state machine (see `beckn-registry`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriberStatus {
    Initiated,
    UnderSubscription,
    Subscribed,
    Suspended,
    Revoked,
}

impl SubscriberStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriberStatus::Revoked)
    }
}

/// Unique key for a subscriber row: `(subscriber_id, unique_key_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberKey {
    pub subscriber_id: String,
    pub unique_key_id: String,
}

impl SubscriberKey {
    pub fn new(subscriber_id: impl Into<String>, unique_key_id: impl Into<String>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            unique_key_id: unique_key_id.into(),
        }
    }

    /// Storage key for `subscribers` lookups, e.g. `s1|key-1`.
    pub fn storage_key(&self) -> String {
        format!("{}|{}", self.subscriber_id, self.unique_key_id)
    }
}

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.subscriber_id, self.unique_key_id)
    }
}

/// A registered network participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscriber {
    pub subscriber_id: String,
    pub unique_key_id: String,
    pub subscriber_url: String,
    pub role: Role,
    pub domain: String,
    pub city: String,
    /// Ed25519 signing public key, base64-encoded.
    pub signing_public_key: Option<String>,
    /// X25519 encryption public key, base64-encoded.
    pub encr_public_key: Option<String>,
    pub status: SubscriberStatus,
    pub valid_from: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    pub is_simulated: bool,
    pub created_at: Timestamp,
}

impl Subscriber {
    pub fn key(&self) -> SubscriberKey {
        SubscriberKey::new(self.subscriber_id.clone(), self.unique_key_id.clone())
    }

    /// True when `status=SUBSCRIBED` and `now` falls within the validity
    /// window — the only state in which the subscriber may be discovered
    /// by the Gateway or trusted by a peer.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.status == SubscriberStatus::Subscribed
            && self.valid_from.is_some_and(|f| f <= now)
            && self.valid_until.is_some_and(|u| now < u)
    }
}

// ── Transaction log ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Sent,
    Ack,
    Nack,
    CallbackReceived,
    Timeout,
    Error,
}

/// One append-only row per `(transaction_id, message_id, action)` observed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub message_id: String,
    pub action: String,
    pub domain: String,
    pub city: Option<String>,
    pub bap_id: Option<String>,
    pub bpp_id: Option<String>,
    pub request_body: serde_json::Value,
    pub status: TransactionStatus,
    pub latency_ms: Option<u64>,
    pub recorded_at: Timestamp,
}

// ── Audit log ─────────────────────────────────────────────────────────────────

/// Append-only audit trail row. Never updated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub ip: Option<String>,
    pub timestamp: Timestamp,
}

// ── Beckn envelope ────────────────────────────────────────────────────────────

/// The `context` block carried in every Beckn JSON envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Context {
    pub domain: String,
    pub country: String,
    pub city: String,
    pub action: String,
    pub transaction_id: String,
    pub message_id: String,
    pub bap_id: Option<String>,
    pub bap_uri: Option<String>,
    pub bpp_id: Option<String>,
    pub bpp_uri: Option<String>,
    pub timestamp: String,
}

impl Context {
    /// Validates presence of the mandated fields per §4.6 step 4. Returns the
    /// missing field name on the first violation found.
    pub fn validate_required(&self) -> Result<(), &'static str> {
        if self.domain.is_empty() {
            return Err("domain");
        }
        if self.country.is_empty() {
            return Err("country");
        }
        if self.city.is_empty() {
            return Err("city");
        }
        if self.action.is_empty() {
            return Err("action");
        }
        if self.transaction_id.is_empty() {
            return Err("transaction_id");
        }
        if self.message_id.is_empty() {
            return Err("message_id");
        }
        if self.bap_id.as_deref().unwrap_or("").is_empty() {
            return Err("bap_id");
        }
        if self.bap_uri.as_deref().unwrap_or("").is_empty() {
            return Err("bap_uri");
        }
        if self.timestamp.is_empty() {
            return Err("timestamp");
        }
        Ok(())
    }
}

/// ACK/NACK response envelope shape, per §6.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ack {
    pub message: AckMessage,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AckMessage {
    pub ack: AckStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AckStatus {
    pub status: String,
}

impl Ack {
    #[allow(clippy::self_named_constructors)]
    pub fn ack() -> Self {
        Ack {
            message: AckMessage {
                ack: AckStatus { status: "ACK".to_string() },
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Nack {
    pub message: AckMessage,
    pub error: NackError,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NackError {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub message: String,
}

impl Nack {
    pub fn new(kind: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Nack {
            message: AckMessage {
                ack: AckStatus { status: "NACK".to_string() },
            },
            error: NackError {
                kind: kind.into(),
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn policy_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("POLICY-ERROR", code, message)
    }

    pub fn context_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("CONTEXT-ERROR", code, message)
    }
}
