use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rand::RngCore;
use x25519_dalek::PublicKey;

use beckn_core::constants::CHALLENGE_VALUE_LEN;
use beckn_core::error::BecknError;
use beckn_core::types::Timestamp;
use beckn_store::StoreDb;

/// Generate 32 random bytes, base64-encoded (§4.4 step 1).
pub fn generate_challenge() -> String {
    let mut bytes = [0u8; CHALLENGE_VALUE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    B64.encode(bytes)
}

pub fn store_challenge(store: &StoreDb, subscriber_id: &str, value: &str, now: Timestamp) -> Result<(), BecknError> {
    store.shared().store_challenge(subscriber_id, value, now)
}

/// Atomically read-and-delete the stored challenge and compare against
/// `answer` in constant time. Single-use regardless of outcome.
pub fn verify_challenge(store: &StoreDb, subscriber_id: &str, answer: &str, now: Timestamp) -> bool {
    match store.shared().take_challenge(subscriber_id, now) {
        Ok(Some(expected)) => constant_time_eq(expected.as_bytes(), answer.as_bytes()),
        _ => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Wrap §4.1 `encrypt` for a challenge payload destined to a subscriber's
/// X25519 public key.
pub fn encrypt_challenge(plain: &str, recipient_x25519_pub: &PublicKey) -> String {
    beckn_crypto::encrypt(plain, recipient_x25519_pub)
}
