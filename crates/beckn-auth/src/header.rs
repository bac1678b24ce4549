use std::collections::HashMap;

use ed25519_dalek::{SigningKey, VerifyingKey};
use thiserror::Error;

use beckn_core::constants::{CLOCK_SKEW_GRACE_SECS, DEFAULT_AUTH_VALIDITY_SECS};
use beckn_crypto::hash::digest_header;

#[derive(Debug, Error)]
pub enum AuthHeaderError {
    #[error("header is missing the \"Signature \" prefix")]
    MissingPrefix,
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
    #[error("keyId is missing the subscriber_id|unique_key_id separator")]
    MalformedKeyId,
    #[error("created/expires is not a valid integer timestamp")]
    InvalidTimestamp,
}

/// Build the exact signing string per §4.2: one `name: value` pair per line,
/// keys lowercased, a single space after the colon. `(created)`/`(expires)`
/// keep their parenthesized pseudo-header names verbatim.
pub fn signing_string(created: i64, expires: i64, digest_b64: &str) -> String {
    format!("(created): {created}\n(expires): {expires}\ndigest: BLAKE-512={digest_b64}")
}

pub struct AuthHeaderParams<'a> {
    pub subscriber_id: &'a str,
    pub unique_key_id: &'a str,
    pub private_key: &'a SigningKey,
    pub body: &'a [u8],
    pub created: Option<i64>,
    pub validity: Option<i64>,
    /// When set, the Gateway variant: inserts `|<domain>` into keyId.
    pub domain: Option<&'a str>,
}

/// Build the full `Authorization` header value.
pub fn build_auth_header(params: AuthHeaderParams<'_>, now: i64) -> String {
    let created = params.created.unwrap_or(now);
    let expires = created + params.validity.unwrap_or(DEFAULT_AUTH_VALIDITY_SECS);

    let digest = digest_header(params.body);
    let digest_b64 = digest
        .strip_prefix("BLAKE-512=")
        .expect("digest_header always prefixes with BLAKE-512=");

    let signing_str = signing_string(created, expires, digest_b64);
    let signature = beckn_crypto::sign(signing_str.as_bytes(), params.private_key);
    let signature_b64 = beckn_crypto::ed25519::signature_to_b64(&signature);

    let key_id = match params.domain {
        Some(domain) => format!(
            "{}|{}|ed25519|{}",
            params.subscriber_id, params.unique_key_id, domain
        ),
        None => format!("{}|{}|ed25519", params.subscriber_id, params.unique_key_id),
    };

    format!(
        "Signature keyId=\"{key_id}\",algorithm=\"ed25519\",created=\"{created}\",expires=\"{expires}\",headers=\"(created) (expires) digest\",signature=\"{signature_b64}\""
    )
}

#[derive(Debug, Clone)]
pub struct ParsedAuthHeader {
    pub subscriber_id: String,
    pub unique_key_id: String,
    pub domain: Option<String>,
    pub algorithm: String,
    pub created: i64,
    pub expires: i64,
    pub signature: String,
}

/// Parse an `Authorization` header value. Tolerant of arbitrary whitespace
/// between parameters and any parameter order.
pub fn parse_auth_header(hdr: &str) -> Result<ParsedAuthHeader, AuthHeaderError> {
    let rest = hdr
        .trim()
        .strip_prefix("Signature")
        .ok_or(AuthHeaderError::MissingPrefix)?
        .trim_start();

    let params = parse_params(rest);

    let key_id = params
        .get("keyId")
        .ok_or(AuthHeaderError::MissingParameter("keyId"))?;
    let mut parts = key_id.splitn(4, '|');
    let subscriber_id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or(AuthHeaderError::MalformedKeyId)?
        .to_string();
    let unique_key_id = parts
        .next()
        .ok_or(AuthHeaderError::MalformedKeyId)?
        .to_string();
    let _algorithm_in_key_id = parts.next();
    let domain = parts.next().map(str::to_string);

    let algorithm = params
        .get("algorithm")
        .ok_or(AuthHeaderError::MissingParameter("algorithm"))?
        .to_string();
    let created = params
        .get("created")
        .ok_or(AuthHeaderError::MissingParameter("created"))?
        .parse()
        .map_err(|_| AuthHeaderError::InvalidTimestamp)?;
    let expires = params
        .get("expires")
        .ok_or(AuthHeaderError::MissingParameter("expires"))?
        .parse()
        .map_err(|_| AuthHeaderError::InvalidTimestamp)?;
    let signature = params
        .get("signature")
        .ok_or(AuthHeaderError::MissingParameter("signature"))?
        .to_string();

    Ok(ParsedAuthHeader {
        subscriber_id,
        unique_key_id,
        domain,
        algorithm,
        created,
        expires,
        signature,
    })
}

/// Splits `key="value", key2="value2" ...` into a map, tolerating arbitrary
/// whitespace around commas and equal signs.
fn parse_params(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in s.split(',') {
        let pair = pair.trim();
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"');
        if !key.is_empty() {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

/// Reconstructs the signing string from the parsed header and the actual
/// body, then verifies. Total: never throws, always returns a bool.
///
/// Fails if `now > expires + 30s` (clock-skew grace), the algorithm isn't
/// `ed25519`, or the signature doesn't verify.
pub fn verify_auth_header(parsed: &ParsedAuthHeader, body: &[u8], public_key: &VerifyingKey, now: i64) -> bool {
    if parsed.algorithm != "ed25519" {
        return false;
    }
    if now > parsed.expires + CLOCK_SKEW_GRACE_SECS {
        return false;
    }

    let digest = digest_header(body);
    let Some(digest_b64) = digest.strip_prefix("BLAKE-512=") else {
        return false;
    };
    let signing_str = signing_string(parsed.created, parsed.expires, digest_b64);

    let Ok(sig_bytes) = beckn_crypto::ed25519::signature_from_b64(&parsed.signature) else {
        return false;
    };

    beckn_crypto::verify(signing_str.as_bytes(), &sig_bytes, public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beckn_crypto::Ed25519KeyPair;

    #[test]
    fn round_trip_sign_verify() {
        let kp = Ed25519KeyPair::generate();
        let body = br#"{"x":1}"#;

        let hdr = build_auth_header(
            AuthHeaderParams {
                subscriber_id: "s1",
                unique_key_id: "k1",
                private_key: &kp.signing_key(),
                body,
                created: Some(1_700_000_000),
                validity: Some(3600),
                domain: None,
            },
            1_700_000_000,
        );

        let parsed = parse_auth_header(&hdr).unwrap();
        assert_eq!(parsed.subscriber_id, "s1");
        assert_eq!(parsed.unique_key_id, "k1");
        assert_eq!(parsed.created, 1_700_000_000);
        assert_eq!(parsed.expires, 1_700_003_600);

        assert!(verify_auth_header(&parsed, body, &kp.verifying_key(), 1_700_000_100));
        assert!(!verify_auth_header(&parsed, body, &kp.verifying_key(), 1_700_003_700));
    }

    #[test]
    fn tampered_body_fails_verify() {
        let kp = Ed25519KeyPair::generate();
        let body = br#"{"x":1}"#;
        let hdr = build_auth_header(
            AuthHeaderParams {
                subscriber_id: "s1",
                unique_key_id: "k1",
                private_key: &kp.signing_key(),
                body,
                created: Some(1_700_000_000),
                validity: Some(3600),
                domain: None,
            },
            1_700_000_000,
        );
        let parsed = parse_auth_header(&hdr).unwrap();
        assert!(!verify_auth_header(&parsed, b"{\"x\":2}", &kp.verifying_key(), 1_700_000_100));
    }

    #[test]
    fn domain_bound_key_id_parses() {
        let kp = Ed25519KeyPair::generate();
        let hdr = build_auth_header(
            AuthHeaderParams {
                subscriber_id: "gw1",
                unique_key_id: "k1",
                private_key: &kp.signing_key(),
                body: b"{}",
                created: None,
                validity: None,
                domain: Some("RET10"),
            },
            1_700_000_000,
        );
        let parsed = parse_auth_header(&hdr).unwrap();
        assert_eq!(parsed.domain.as_deref(), Some("RET10"));
    }

    #[test]
    fn whitespace_and_param_order_are_tolerated() {
        let hdr = "Signature   algorithm=\"ed25519\" , keyId=\"s1|k1|ed25519\",signature=\"abc\",created=\"1\",expires=\"2\"";
        let parsed = parse_auth_header(hdr).unwrap();
        assert_eq!(parsed.subscriber_id, "s1");
        assert_eq!(parsed.created, 1);
        assert_eq!(parsed.expires, 2);
    }
}
