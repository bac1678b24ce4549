use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),
}

/// Sign `message_bytes` with an Ed25519 private key. Deterministic; produces
/// a 64-byte signature. Callers must not pre-hash the message — Ed25519
/// hashes internally.
pub fn sign(message_bytes: &[u8], private_key: &SigningKey) -> [u8; 64] {
    private_key.sign(message_bytes).to_bytes()
}

/// Verify an Ed25519 signature. Total: never panics, always returns a bool.
pub fn verify(message_bytes: &[u8], signature_bytes: &[u8], public_key: &VerifyingKey) -> bool {
    let Ok(sig_arr): Result<[u8; 64], _> = signature_bytes.try_into() else {
        return false;
    };
    let sig = Signature::from_bytes(&sig_arr);
    public_key.verify(message_bytes, &sig).is_ok()
}

pub fn public_key_from_b64(s: &str) -> Result<VerifyingKey, SignatureError> {
    let bytes = STANDARD
        .decode(s)
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SignatureError::InvalidPublicKey("expected 32 bytes".into()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))
}

pub fn public_key_to_b64(key: &VerifyingKey) -> String {
    STANDARD.encode(key.to_bytes())
}

pub fn signature_to_b64(sig: &[u8]) -> String {
    STANDARD.encode(sig)
}

pub fn signature_from_b64(s: &str) -> Result<Vec<u8>, SignatureError> {
    STANDARD
        .decode(s)
        .map_err(|e| SignatureError::InvalidSignatureEncoding(e.to_string()))
}

/// An Ed25519 identity: signing key plus its public counterpart. The secret
/// bytes are wrapped in `Zeroizing` and wiped on drop.
#[derive(Serialize, Deserialize)]
pub struct Ed25519KeyPair {
    #[serde(with = "secret_b64")]
    secret: Zeroizing<[u8; 32]>,
    public: VerifyingKeyB64,
}

mod secret_b64 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Zeroizing<[u8; 32]>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(&**v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Zeroizing<[u8; 32]>, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = STANDARD.decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte secret"))?;
        Ok(Zeroizing::new(arr))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy)]
struct VerifyingKeyB64(#[serde(with = "pub_b64")] [u8; 32]);

mod pub_b64 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = STANDARD.decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte public key"))
    }
}

impl Ed25519KeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public = signing_key.verifying_key();
        Self {
            secret: Zeroizing::new(signing_key.to_bytes()),
            public: VerifyingKeyB64(public.to_bytes()),
        }
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from_bytes(&self.public.0).expect("stored public key is always valid")
    }

    pub fn public_key_b64(&self) -> String {
        public_key_to_b64(&self.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        sign(message, &self.signing_key())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair({}…)", &self.public_key_b64()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = Ed25519KeyPair::generate();
        let msg = b"(created): 1700000000\n(expires): 1700003600\ndigest: BLAKE-512=abc";
        let sig = kp.sign(msg);
        assert!(verify(msg, &sig, &kp.verifying_key()));
    }

    #[test]
    fn tampered_message_fails() {
        let kp = Ed25519KeyPair::generate();
        let sig = kp.sign(b"original");
        assert!(!verify(b"tampered", &sig, &kp.verifying_key()));
    }

    #[test]
    fn wrong_signature_length_fails_closed() {
        let kp = Ed25519KeyPair::generate();
        assert!(!verify(b"msg", b"not-a-signature", &kp.verifying_key()));
    }

    #[test]
    fn b64_public_key_round_trips() {
        let kp = Ed25519KeyPair::generate();
        let encoded = kp.public_key_b64();
        let decoded = public_key_from_b64(&encoded).unwrap();
        assert_eq!(decoded, kp.verifying_key());
    }
}
