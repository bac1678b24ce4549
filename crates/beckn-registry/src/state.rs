use std::sync::Arc;

use beckn_store::StoreDb;
use ed25519_dalek::SigningKey;

/// Shared registry state: its own identity (used to sign the site
/// verification token and the `/ondc/on_subscribe` peer responses) plus
/// the persisted store.
#[derive(Clone)]
pub struct RegistryState {
    pub store: Arc<StoreDb>,
    pub signing_key: Arc<SigningKey>,
    /// X25519 private key material for the peer `/ondc/on_subscribe` role.
    /// `None` means this deployment never plays the peer role.
    pub x25519_secret: Option<Arc<x25519_dalek::StaticSecret>>,
    /// `request_id` signed (raw bytes, no hash) for site verification.
    pub site_verification_request_id: String,
}
