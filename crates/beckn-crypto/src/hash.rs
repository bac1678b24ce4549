use base64::{engine::general_purpose::STANDARD, Engine as _};
use blake2::{Blake2b512, Digest};

/// BLAKE-512 digest of raw body bytes, base64-encoded. Length is always 88
/// characters (64-byte digest, standard base64 with padding).
pub fn hash_body(body_bytes: &[u8]) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(body_bytes);
    STANDARD.encode(hasher.finalize())
}

/// The `Digest` header value for a request body.
pub fn digest_header(body_bytes: &[u8]) -> String {
    format!("BLAKE-512={}", hash_body(body_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_88_chars() {
        let d = hash_body(b"{\"x\":1}");
        assert_eq!(d.len(), 88);
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(hash_body(b"same"), hash_body(b"same"));
        assert_ne!(hash_body(b"same"), hash_body(b"different"));
    }

    #[test]
    fn digest_header_prefix() {
        assert!(digest_header(b"x").starts_with("BLAKE-512="));
    }
}
