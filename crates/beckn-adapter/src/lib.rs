//! beckn-adapter
//!
//! The participant (BAP/BPP) handler contract: one route per Beckn
//! action and one per callback, the seven-step verify/validate/log/ack
//! pipeline, and the outbound signed client used to deliver `on_*`
//! callbacks and peer calls.

pub mod client;
pub mod router;
pub mod state;

pub use router::router;
pub use state::AdapterState;
