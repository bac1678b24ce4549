use std::sync::Arc;

use beckn_middleware::MiddlewareConfig;
use beckn_store::StoreDb;
use ed25519_dalek::SigningKey;
use lapin::Channel;

/// Shared Gateway state: its own identity (used to re-sign fanned-out
/// requests and relayed callbacks), the discovery store, and the broker
/// channel the `/search` handler and the consumer workers both publish
/// and consume on.
///
/// `broker` is `None` only in tests that exercise `/on_search` (whose relay
/// path never touches the broker) without a live AMQP connection; every real
/// binary connects the broker before serving traffic.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<StoreDb>,
    pub signing_key: Arc<SigningKey>,
    pub subscriber_id: String,
    pub unique_key_id: String,
    /// Inserted into the re-signed keyId per §4.2's Gateway variant.
    pub domain: String,
    pub middleware_config: MiddlewareConfig,
    pub broker: Option<Channel>,
    pub http_client: reqwest::Client,
}
