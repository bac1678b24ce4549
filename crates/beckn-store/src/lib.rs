//! beckn-store
//!
//! Persisted state: the Subscriber table, the append-only Transaction and
//! Audit logs, and the TTL-bounded shared-storage entries (public-key cache,
//! challenge records, dedup entries, rate counters) that back the
//! middleware pipeline and the registry's cache-aside key lookup.

pub mod db;
pub mod shared;

pub use db::StoreDb;
pub use shared::SharedStore;
