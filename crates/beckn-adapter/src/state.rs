use std::sync::Arc;

use beckn_core::types::Role;
use beckn_middleware::MiddlewareConfig;
use beckn_store::StoreDb;
use ed25519_dalek::SigningKey;

/// Shared adapter state: this deployment's own identity plus the
/// enforcement toggles that distinguish a BAP from a BPP rollout. Role is
/// a field, not a type parameter — §4.6's polymorphism is limited to
/// finder-fee enforcement and which peer to sign outbound traffic with.
#[derive(Clone)]
pub struct AdapterState {
    pub store: Arc<StoreDb>,
    pub role: Role,
    pub subscriber_id: String,
    pub unique_key_id: String,
    pub signing_key: Arc<SigningKey>,
    pub middleware_config: MiddlewareConfig,
    /// BPP-only: reject `select|init|confirm` missing finder-fee metadata.
    pub enforce_settlement: bool,
    pub http_client: reqwest::Client,
}
