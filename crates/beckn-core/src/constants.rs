//! ─── Beckn Protocol Constants ───────────────────────────────────────────────
//!
//! Shared timing windows, TTLs, and wire constants used across the
//! signed-request plane, the registry state machine, and the middleware
//! pipeline. Each service also reads its own tunables (rate-limit max,
//! window, enforcement toggles) from configuration — see `beckn-node`.

// ── Signing / auth header ────────────────────────────────────────────────────

/// Default validity window for a built `Authorization` header (seconds).
pub const DEFAULT_AUTH_VALIDITY_SECS: i64 = 3600;

/// Clock-skew grace period applied when checking `expires` on verify.
pub const CLOCK_SKEW_GRACE_SECS: i64 = 30;

/// Ed25519 signature length in bytes.
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// Ed25519 public key length in bytes.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// BLAKE-512 digest length in bytes (before base64 encoding).
pub const BLAKE512_DIGEST_LEN: usize = 64;

/// Length of the base64-encoded BLAKE-512 digest string.
pub const BLAKE512_DIGEST_B64_LEN: usize = 88;

// ── Challenge encryption ─────────────────────────────────────────────────────

/// X25519 public/private key length in bytes.
pub const X25519_KEY_LEN: usize = 32;

/// AES-256-GCM IV (nonce) length in bytes.
pub const AES_GCM_IV_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_GCM_TAG_LEN: usize = 16;

/// Minimum combined-payload length for a valid encrypted challenge:
/// ephemeral_pub(32) + iv(12) + tag(16), with zero ciphertext bytes.
pub const MIN_ENCRYPTED_CHALLENGE_LEN: usize = X25519_KEY_LEN + AES_GCM_IV_LEN + AES_GCM_TAG_LEN;

// ── KDF ───────────────────────────────────────────────────────────────────────

/// PBKDF2-HMAC-SHA-512 iteration count.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Derived key length in bytes.
pub const KDF_OUTPUT_LEN: usize = 32;

// ── TTLs (shared storage) ────────────────────────────────────────────────────

/// Challenge record TTL (seconds). Single-use regardless of TTL.
pub const CHALLENGE_TTL_SECS: u64 = 300;

/// Public-key cache entry TTL (seconds).
pub const PUBKEY_CACHE_TTL_SECS: u64 = 300;

/// Duplicate-message-id suppression TTL (seconds).
pub const DEDUP_TTL_SECS: u64 = 300;

/// Raw challenge value length in bytes, before base64 encoding.
pub const CHALLENGE_VALUE_LEN: usize = 32;

// ── Subscription lifecycle ───────────────────────────────────────────────────

/// Validity window granted to a newly SUBSCRIBED subscriber (seconds, ~1 year).
pub const SUBSCRIPTION_VALIDITY_SECS: i64 = 365 * 24 * 3600;

// ── Gateway fan-out ───────────────────────────────────────────────────────────

/// Consumer worker retry backoff schedule (seconds), applied in order.
pub const GATEWAY_RETRY_BACKOFF_SECS: [u64; 3] = [1, 4, 16];

/// Maximum delivery attempts per target before dead-lettering.
pub const GATEWAY_MAX_ATTEMPTS: u32 = 3;

// ── Outbound HTTP deadlines ───────────────────────────────────────────────────

/// Default deadline for outbound health checks (seconds).
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Default deadline for outbound protocol calls (seconds).
pub const PROTOCOL_CALL_TIMEOUT_SECS: u64 = 30;

// ── Standard error codes (wire-visible) ──────────────────────────────────────

pub const ERR_INVALID_REQUEST: &str = "10000";
pub const ERR_AUTH: &str = "10001";
pub const ERR_INTERNAL: &str = "20000";
pub const ERR_RATE_LIMIT: &str = "30001";
pub const ERR_DUPLICATE: &str = "30013";
pub const ERR_POLICY: &str = "30015";
