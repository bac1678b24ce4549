//! beckn-auth
//!
//! Builds and parses the Beckn `Authorization` header: the signing string,
//! the keyId format, and the orchestration of sign/verify against a
//! resolved public key. See `beckn-crypto` for the underlying primitives.

pub mod header;

pub use header::{build_auth_header, parse_auth_header, verify_auth_header, AuthHeaderParams, ParsedAuthHeader};
