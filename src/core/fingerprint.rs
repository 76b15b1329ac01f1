//! API key fingerprints.
//!
//! Keys never appear in logs or CLI output; a short SHA-256 prefix is shown
//! instead so two configurations can still be told apart.

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 12;

/// Short, stable fingerprint of an API key.
#[must_use]
pub fn fingerprint(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("sha256:{}", &digest[..FINGERPRINT_LEN])
}

/// Fingerprint of an optional key, or a placeholder when none is set.
#[must_use]
pub fn describe(api_key: Option<&str>) -> String {
    api_key.map_or_else(|| "<not set>".to_string(), fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = fingerprint("test-key");
        assert_eq!(a, fingerprint("test-key"));
        assert_eq!(a.len(), "sha256:".len() + FINGERPRINT_LEN);
        assert!(!a.contains("test-key"));
    }

    #[test]
    fn different_keys_differ() {
        assert_ne!(fingerprint("key-a"), fingerprint("key-b"));
    }

    #[test]
    fn describe_missing_key() {
        assert_eq!(describe(None), "<not set>");
        assert!(describe(Some("k")).starts_with("sha256:"));
    }
}
