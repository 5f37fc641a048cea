//! Shared SHA-256 helpers for the demo backends.
//!
//! Each backend supplies its own domain tags; this module only owns the
//! mechanics of accumulating parts and hex-encoding the digest.

use sha2::{Digest, Sha256};

/// Hash the concatenation of `parts` and return the lowercase-hex digest.
pub(crate) fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_64_lowercase_hex_chars() {
        let d = hex_digest(&[b"abc"]);
        assert_eq!(d.len(), 64);
        assert!(d
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(hex_digest(&[b"a", b"b"]), hex_digest(&[b"a", b"b"]));
    }

    #[test]
    fn part_boundaries_do_not_matter_but_content_does() {
        // SHA-256 over the same byte stream, split differently.
        assert_eq!(hex_digest(&[b"ab"]), hex_digest(&[b"a", b"b"]));
        assert_ne!(hex_digest(&[b"ab"]), hex_digest(&[b"ba"]));
    }

    #[test]
    fn matches_known_vector() {
        // SHA-256("abc"), FIPS 180-2 appendix B.1.
        assert_eq!(
            hex_digest(&[b"abc"]),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
