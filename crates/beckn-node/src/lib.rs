//! beckn-node
//!
//! Env-var driven startup shared by the four service binaries
//! (`beckn-registry`, `beckn-gateway`, `beckn-bap`, `beckn-bpp`). No
//! command-line flags are part of the core contract (§6) — every
//! tunable is read from the environment, optionally via a `.env` file.

use std::sync::Arc;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use beckn_middleware::MiddlewareConfig;
use ed25519_dalek::SigningKey;
use x25519_dalek::StaticSecret;

/// Load `.env` (if present) and install a `tracing_subscriber` with
/// `EnvFilter`, matching every teacher binary's startup sequence.
pub fn init() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,beckn=debug".parse().unwrap()),
        )
        .init();
}

fn env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("missing required env var {name}"))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// This deployment's signing identity: `subscriber_id`, `unique_key_id`,
/// the Ed25519 private key (32-byte seed, base64), and an optional
/// X25519 private key (for the registry's peer `/ondc/on_subscribe`
/// role or a participant's own challenge decryption).
pub struct Identity {
    pub subscriber_id: String,
    pub unique_key_id: String,
    pub signing_key: Arc<SigningKey>,
    pub x25519_secret: Option<Arc<StaticSecret>>,
}

pub fn load_identity() -> anyhow::Result<Identity> {
    let subscriber_id = env("BECKN_SUBSCRIBER_ID")?;
    let unique_key_id = env("BECKN_UNIQUE_KEY_ID")?;

    let seed_b64 = env("BECKN_SIGNING_KEY")?;
    let seed_bytes = B64.decode(seed_b64).context("BECKN_SIGNING_KEY is not valid base64")?;
    let seed: [u8; 32] = seed_bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("BECKN_SIGNING_KEY must decode to 32 bytes"))?;
    let signing_key = Arc::new(SigningKey::from_bytes(&seed));

    let x25519_secret = match std::env::var("BECKN_X25519_SECRET") {
        Ok(b64) => {
            let bytes = B64.decode(b64).context("BECKN_X25519_SECRET is not valid base64")?;
            let arr: [u8; 32] = bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("BECKN_X25519_SECRET must decode to 32 bytes"))?;
            Some(Arc::new(StaticSecret::from(arr)))
        }
        Err(_) => None,
    };

    Ok(Identity {
        subscriber_id,
        unique_key_id,
        signing_key,
        x25519_secret,
    })
}

/// Rate-limit / dedup / enforcement tunables (§6's configuration surface).
pub fn load_middleware_config() -> MiddlewareConfig {
    MiddlewareConfig {
        rate_limit_max: env_or_parse("BECKN_RATE_LIMIT_MAX", 100),
        rate_limit_window_secs: env_or_parse("BECKN_RATE_LIMIT_WINDOW_SECS", 60),
        enforce_sla: env_or_parse("BECKN_ENFORCE_SLA", false),
        enforce_tags: env_or_parse("BECKN_ENFORCE_TAGS", false),
    }
}

pub fn enforce_settlement() -> bool {
    env_or_parse("BECKN_ENFORCE_SETTLEMENT", false)
}

pub fn listen_addr() -> anyhow::Result<std::net::SocketAddr> {
    env_or("BECKN_LISTEN_ADDR", "0.0.0.0:8080")
        .parse()
        .context("BECKN_LISTEN_ADDR is not a valid socket address")
}

pub fn db_path() -> String {
    env_or("BECKN_DB_PATH", "./data/beckn.sled")
}

pub fn amqp_url() -> String {
    env_or("BECKN_AMQP_URL", "amqp://127.0.0.1:5672/%2f")
}

pub fn gateway_worker_count() -> usize {
    env_or_parse("BECKN_GATEWAY_WORKERS", 4)
}
