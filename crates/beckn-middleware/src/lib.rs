//! beckn-middleware
//!
//! The three-stage compliance pipeline (rate limiter, duplicate detector,
//! network policy) run in strict order in front of every protocol route,
//! plus the shared compliance helpers (finder-fee validator, global error
//! handler) used by the adapter's per-action validation step.

pub mod error;
pub mod pipeline;
pub mod policy;

pub use error::{beckn_error_response, MiddlewareError};
pub use pipeline::{dedup_layer, rate_limit_layer, MiddlewareConfig, MiddlewareState};
pub use policy::{finder_fee_validator, network_policy_layer};
