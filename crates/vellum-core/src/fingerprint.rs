//! Content fingerprinting for change detection.
//!
//! A fingerprint is the truncated SHA-256 of a note's raw bytes. Two
//! reads of unchanged content always produce an identical fingerprint;
//! this is the sole basis for "did anything really change" decisions in
//! the watch stabilizer and the indexing pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the full SHA-256 digest.
/// 64 bits of prefix is plenty for a personal-scale vault.
const FINGERPRINT_HEX_LEN: usize = 16;

/// A stable content fingerprint for a note body at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw file bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_HEX_LEN);
        Self(hex)
    }

    /// Fingerprint text content.
    pub fn of_text(text: &str) -> Self {
        Self::of_bytes(text.as_bytes())
    }

    /// The hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full SHA-256 hex digest of text content. Used as the embedding cache
/// key, where collision resistance matters more than brevity.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = Fingerprint::of_text("# A\ntext");
        let b = Fingerprint::of_text("# A\ntext");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_distinguishes_content() {
        let a = Fingerprint::of_text("# A\ntext");
        let b = Fingerprint::of_text("# A\ntext ");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_length() {
        let fp = Fingerprint::of_bytes(b"hello");
        assert_eq!(fp.as_str().len(), 16);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_bytes_and_text_agree() {
        assert_eq!(
            Fingerprint::of_bytes("note body".as_bytes()),
            Fingerprint::of_text("note body")
        );
    }

    #[test]
    fn test_content_hash_full_digest() {
        let h = content_hash("chunk text");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash("chunk text"));
        assert_ne!(h, content_hash("chunk text!"));
    }
}
