//! beckn-gateway
//!
//! The hardest subsystem: never fulfills business, multiplexes `/search`
//! to the discovered seller set over a durable broker-backed work queue,
//! and relays `/on_search` callbacks back to the originating buyer app.
//! No response aggregation — the only correlation across the many
//! independent `on_search` callbacks a single `search` may produce is
//! `transaction_id`.

pub mod broker;
pub mod router;
pub mod state;
pub mod worker;

pub use router::router;
pub use state::GatewayState;
pub use worker::spawn_workers;
