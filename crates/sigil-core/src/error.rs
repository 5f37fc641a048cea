//! Validation errors for user-supplied input.
//!
//! Everything in this enum is recoverable at the point of the call: the
//! operation that raised it is a no-op and the user is prompted again.

use thiserror::Error;

/// Rejected user input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required name was empty or whitespace-only.
    #[error("{what} name must not be empty")]
    EmptyName {
        /// What was being named ("group", "identity").
        what: &'static str,
    },

    /// A commitment string was not canonical lowercase hex.
    #[error("invalid commitment: {0:?} (expected 64 lowercase hex chars)")]
    InvalidCommitment(String),

    /// A Merkle root string was not canonical lowercase hex.
    #[error("invalid merkle root: {0:?} (expected 64 lowercase hex chars)")]
    InvalidRoot(String),

    /// The proof message (signal) was empty.
    #[error("message must not be empty")]
    EmptyMessage,

    /// The proof scope (external nullifier) was empty.
    #[error("scope must not be empty")]
    EmptyScope,
}
