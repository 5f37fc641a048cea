//! # Commitment and Merkle-Root Newtypes
//!
//! Canonical string forms of the two cryptographic values the consistency
//! machinery compares: an identity's public commitment and a group's
//! Merkle root. Both are 64 lowercase hex characters.
//!
//! Equality is value equality on the canonical string. Groups are
//! rebuilt from persisted primitive data on every reload, so comparing by
//! object identity would report spurious divergence; the canonical form
//! is the only identity these values have.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Helper macro to implement `Deserialize` for string newtypes that must
/// validate their contents. Deserializes as a plain `String`, then routes
/// through the type's `new()` constructor so that invalid persisted values
/// are rejected at load time — not silently accepted.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Validate and normalize a 64-char hex value. Accepts mixed case and
/// surrounding whitespace; stores lowercase.
fn validate_hex64(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_lowercase();
    if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(normalized)
}

/// An identity's public cryptographic commitment.
///
/// Derived from a private secret by the proof backend; unique across
/// identities with overwhelming probability. Appending a commitment to a
/// group's member list is what membership *is* — there is no separate
/// membership record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Commitment(String);

impl_validating_deserialize!(Commitment);

impl Commitment {
    /// Create a commitment from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCommitment`] unless the value is
    /// 64 hex characters (any case; stored lowercase).
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        match validate_hex64(&raw) {
            Some(canonical) => Ok(Self(canonical)),
            None => Err(ValidationError::InvalidCommitment(raw)),
        }
    }

    /// Access the canonical lowercase-hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group's Merkle root: a single digest summarizing the entire ordered
/// membership set.
///
/// Always recomputed from `(depth, members)` by the proof backend, never
/// hand-edited. Changes whenever membership changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MerkleRoot(String);

impl_validating_deserialize!(MerkleRoot);

impl MerkleRoot {
    /// Create a root from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRoot`] unless the value is
    /// 64 hex characters (any case; stored lowercase).
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        match validate_hex64(&raw) {
            Some(canonical) => Ok(Self(canonical)),
            None => Err(ValidationError::InvalidRoot(raw)),
        }
    }

    /// Access the canonical lowercase-hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MerkleRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
