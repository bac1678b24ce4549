//! beckn-registry
//!
//! The subscription state machine (`INITIATED -> UNDER_SUBSCRIPTION ->
//! SUBSCRIBED -> {SUSPENDED, REVOKED}`), the cache-aside key lookup it
//! shares with every other component, the one-time challenge protocol,
//! and the axum router exposing `/subscribe`, `/on_subscribe`,
//! `/ondc/on_subscribe`, `/lookup`, and `/ondc-site-verification.html`.

pub mod challenge;
pub mod router;
pub mod state;

pub use router::router;
pub use state::RegistryState;
