//! API key issuance and webhook payload signing.
//!
//! Raw API keys are returned to the caller exactly once; only the SHA-256
//! hash and a short display prefix are ever stored.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::ids::random_token;
use crate::types::ApiKeyOwner;

type HmacSha256 = Hmac<Sha256>;

/// Role prefix for publisher keys.
pub const PUBLISHER_KEY_PREFIX: &str = "hld_pub_";
/// Role prefix for subscriber keys.
pub const SUBSCRIBER_KEY_PREFIX: &str = "hld_sub_";

/// Length of the random identifier appended to the role prefix.
const KEY_TOKEN_LEN: usize = 24;

/// Number of leading raw-key characters stored for human identification.
const KEY_DISPLAY_PREFIX_LEN: usize = 12;

/// Maximum allowed clock skew for signed payloads, in seconds.
pub const SIGNATURE_MAX_AGE_SECS: i64 = 300;

/// A freshly issued API key.
pub struct IssuedKey {
    /// The raw key. Shown to the caller once, never stored.
    pub raw: String,
    /// SHA-256 hex digest of the raw key.
    pub key_hash: String,
    /// First 12 characters of the raw key, for logs and listings.
    pub key_prefix: String,
}

/// Issue a new API key for the given owner role.
pub fn generate_api_key(owner: ApiKeyOwner) -> IssuedKey {
    let role_prefix = match owner {
        ApiKeyOwner::Publisher => PUBLISHER_KEY_PREFIX,
        ApiKeyOwner::Subscriber => SUBSCRIBER_KEY_PREFIX,
    };
    let raw = format!("{}{}", role_prefix, random_token(KEY_TOKEN_LEN));
    let key_hash = hash_api_key(&raw);
    let key_prefix = raw.chars().take(KEY_DISPLAY_PREFIX_LEN).collect();
    IssuedKey {
        raw,
        key_hash,
        key_prefix,
    }
}

/// SHA-256 hex digest of a raw API key, the stored lookup key.
pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sign a payload body with the subscriber's webhook secret.
///
/// The signature covers `"{timestamp}.{body}"` so a captured request cannot
/// be replayed outside the timestamp window. Returns `sha256=<hex>`.
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `sha256=<hex>` signature in constant time.
///
/// Rejects when the signature does not match or when `timestamp` is more
/// than [`SIGNATURE_MAX_AGE_SECS`] away from `now`.
pub fn verify_signature(
    signature: &str,
    secret: &str,
    timestamp: i64,
    body: &str,
    now: i64,
) -> bool {
    if (now - timestamp).abs() > SIGNATURE_MAX_AGE_SECS {
        return false;
    }
    let expected = sign_payload(secret, timestamp, body);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_api_key(ApiKeyOwner::Publisher);
        assert!(key.raw.starts_with("hld_pub_"));
        assert_eq!(key.raw.len(), "hld_pub_".len() + 24);
        assert_eq!(key.key_prefix.len(), 12);
        assert!(key.raw.starts_with(&key.key_prefix));
    }

    #[test]
    fn test_subscriber_key_prefix() {
        let key = generate_api_key(ApiKeyOwner::Subscriber);
        assert!(key.raw.starts_with("hld_sub_"));
    }

    #[test]
    fn test_hash_matches_raw_key() {
        let key = generate_api_key(ApiKeyOwner::Publisher);
        assert_eq!(hash_api_key(&key.raw), key.key_hash);
        // 32 bytes = 64 hex chars
        assert_eq!(key.key_hash.len(), 64);
    }

    #[test]
    fn test_distinct_keys_distinct_hashes() {
        let a = generate_api_key(ApiKeyOwner::Publisher);
        let b = generate_api_key(ApiKeyOwner::Publisher);
        assert_ne!(a.raw, b.raw);
        assert_ne!(a.key_hash, b.key_hash);
    }

    #[test]
    fn test_sign_payload_format() {
        let sig = sign_payload("secret", 1_706_400_000, "body");
        assert!(sig.starts_with("sha256="));
        let hex_part = &sig["sha256=".len()..];
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sign_payload_deterministic() {
        assert_eq!(
            sign_payload("s", 1_706_400_000, "b"),
            sign_payload("s", 1_706_400_000, "b")
        );
    }

    #[test]
    fn test_signature_changes_with_inputs() {
        let base = sign_payload("s", 1_706_400_000, "b");
        assert_ne!(base, sign_payload("other", 1_706_400_000, "b"));
        assert_ne!(base, sign_payload("s", 1_706_400_001, "b"));
        assert_ne!(base, sign_payload("s", 1_706_400_000, "c"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let now = 1_706_400_000;
        let sig = sign_payload("secret", now, "payload");
        assert!(verify_signature(&sig, "secret", now, "payload", now));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let now = 1_706_400_000;
        let sig = sign_payload("secret", now, "payload");
        assert!(!verify_signature(&sig, "wrong", now, "payload", now));
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let now = 1_706_400_000;
        let sig = sign_payload("secret", now, "payload");
        assert!(!verify_signature(&sig, "secret", now, "tampered", now));
    }

    #[test]
    fn test_verify_timestamp_window_boundary() {
        let ts = 1_706_400_000;
        let sig = sign_payload("secret", ts, "payload");
        // Exactly 300 s old: accepted. 301 s old: rejected.
        assert!(verify_signature(&sig, "secret", ts, "payload", ts + 300));
        assert!(!verify_signature(&sig, "secret", ts, "payload", ts + 301));
        // Timestamps from the future obey the same window.
        assert!(verify_signature(&sig, "secret", ts, "payload", ts - 300));
        assert!(!verify_signature(&sig, "secret", ts, "payload", ts - 301));
    }

    #[test]
    fn test_verify_rejects_even_with_matching_mac_outside_window() {
        let ts = 1_706_400_000;
        let sig = sign_payload("secret", ts, "payload");
        // The MAC itself is valid for (ts, body); the window alone rejects it.
        assert!(!verify_signature(&sig, "secret", ts, "payload", ts + 10_000));
    }

    #[test]
    fn test_verify_rejects_garbage_signature() {
        assert!(!verify_signature(
            "not-a-signature",
            "secret",
            1_706_400_000,
            "payload",
            1_706_400_000
        ));
    }
}
