use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;

use beckn_core::constants::{KDF_ITERATIONS, KDF_OUTPUT_LEN};

/// Derive a key from `master_secret` and `salt` via PBKDF2-HMAC-SHA-512,
/// using the default iteration count and output length.
pub fn kdf(master_secret: &[u8], salt: &[u8]) -> [u8; KDF_OUTPUT_LEN] {
    let mut out = [0u8; KDF_OUTPUT_LEN];
    pbkdf2_hmac::<Sha512>(master_secret, salt, KDF_ITERATIONS, &mut out);
    out
}

/// Same as [`kdf`] with explicit iteration count and output length, for
/// callers that need to deviate from the defaults.
pub fn kdf_with(master_secret: &[u8], salt: &[u8], iterations: u32, length: usize) -> Vec<u8> {
    let mut out = vec![0u8; length];
    pbkdf2_hmac::<Sha512>(master_secret, salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let a = kdf(b"master secret", b"salt");
        let b = kdf(b"master secret", b"salt");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_salt() {
        let a = kdf(b"master secret", b"salt-a");
        let b = kdf(b"master secret", b"salt-b");
        assert_ne!(a, b);
    }

    #[test]
    fn kdf_with_respects_length() {
        let out = kdf_with(b"secret", b"salt", 1000, 16);
        assert_eq!(out.len(), 16);
    }
}
