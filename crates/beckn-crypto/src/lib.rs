//! beckn-crypto
//!
//! Cryptographic primitives for the signed-request protocol plane:
//! Ed25519 sign/verify, BLAKE-512 body digests, X25519 ECDH + AES-256-GCM
//! one-time challenge encryption, and a PBKDF2-HMAC-SHA-512 KDF.

pub mod ed25519;
pub mod hash;
pub mod kdf;
pub mod x25519;

pub use ed25519::{sign, verify, Ed25519KeyPair};
pub use hash::{digest_header, hash_body};
pub use kdf::kdf;
pub use x25519::{decrypt, encrypt};
