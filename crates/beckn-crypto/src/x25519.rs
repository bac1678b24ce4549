use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use beckn_core::constants::{AES_GCM_IV_LEN, AES_GCM_TAG_LEN, MIN_ENCRYPTED_CHALLENGE_LEN, X25519_KEY_LEN};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("payload too short: need at least {min} bytes, got {got}")]
    PayloadTooShort { min: usize, got: usize },
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
    #[error("authentication tag invalid or payload corrupted")]
    DecryptionFailed,
}

/// Encrypt `plaintext_utf8` for `recipient_pub` using an ephemeral X25519 key
/// plus AES-256-GCM. Returns the combined, base64-encoded payload:
/// `ephemeral_pub(32) ‖ iv(12) ‖ auth_tag(16) ‖ ciphertext`.
pub fn encrypt(plaintext_utf8: &str, recipient_pub: &PublicKey) -> String {
    let ephemeral_secret = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_pub = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(recipient_pub);

    let key = Key::<Aes256Gcm>::from_slice(shared.as_bytes());
    let cipher = Aes256Gcm::new(key);

    let mut iv = [0u8; AES_GCM_IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let sealed = cipher
        .encrypt(nonce, plaintext_utf8.as_bytes())
        .expect("AES-256-GCM encryption is infallible for well-formed inputs");
    let split_at = sealed.len() - AES_GCM_TAG_LEN;
    let (ciphertext, tag) = sealed.split_at(split_at);

    let mut combined = Vec::with_capacity(X25519_KEY_LEN + AES_GCM_IV_LEN + AES_GCM_TAG_LEN + ciphertext.len());
    combined.extend_from_slice(ephemeral_pub.as_bytes());
    combined.extend_from_slice(&iv);
    combined.extend_from_slice(tag);
    combined.extend_from_slice(ciphertext);

    STANDARD.encode(combined)
}

/// Decrypt a combined payload produced by [`encrypt`] using the recipient's
/// static X25519 private key.
pub fn decrypt(combined_b64: &str, recipient_priv: &StaticSecret) -> Result<String, CryptoError> {
    let combined = STANDARD
        .decode(combined_b64)
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;

    if combined.len() < MIN_ENCRYPTED_CHALLENGE_LEN {
        return Err(CryptoError::PayloadTooShort {
            min: MIN_ENCRYPTED_CHALLENGE_LEN,
            got: combined.len(),
        });
    }

    let (ephemeral_pub_bytes, rest) = combined.split_at(X25519_KEY_LEN);
    let (iv, rest) = rest.split_at(AES_GCM_IV_LEN);
    let (tag, ciphertext) = rest.split_at(AES_GCM_TAG_LEN);

    let ephemeral_pub_arr: [u8; 32] = ephemeral_pub_bytes
        .try_into()
        .expect("sliced to exactly 32 bytes above");
    let ephemeral_pub = PublicKey::from(ephemeral_pub_arr);
    let shared = recipient_priv.diffie_hellman(&ephemeral_pub);

    let key = Key::<Aes256Gcm>::from_slice(shared.as_bytes());
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(iv);

    let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext = cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let recipient_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let recipient_pub = PublicKey::from(&recipient_secret);

        let plaintext = "3f9a8c2e1b7d4056a9f0e3c2b1a8d7f6";
        let combined = encrypt(plaintext, &recipient_pub);
        let decrypted = decrypt(&combined, &recipient_secret).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn corrupted_tag_fails() {
        let recipient_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let recipient_pub = PublicKey::from(&recipient_secret);
        let combined = encrypt("hello", &recipient_pub);

        let mut raw = STANDARD.decode(&combined).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let tampered = STANDARD.encode(raw);

        assert!(decrypt(&tampered, &recipient_secret).is_err());
    }

    #[test]
    fn too_short_payload_fails() {
        let recipient_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let short = STANDARD.encode([0u8; 10]);
        assert!(matches!(
            decrypt(&short, &recipient_secret),
            Err(CryptoError::PayloadTooShort { .. })
        ));
    }
}
