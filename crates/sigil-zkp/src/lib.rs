//! # sigil-zkp — Proof Backend Capability
//!
//! The cryptographic boundary of the workspace. Everything above this
//! crate treats proof generation and verification as an opaque capability:
//! a [`ProofBackend`] is "a callable matching the generate/verify
//! contract", never a concrete library. Swapping backends requires no
//! change to any consumer.
//!
//! ## Contract
//!
//! - [`ProofBackend::create_identity`] — fresh `(commitment, secret)`
//!   pair; the secret is never derivable from the commitment.
//! - [`ProofBackend::compute_root`] — pure, deterministic, order-sensitive
//!   digest of `(depth, members)`.
//! - [`ProofBackend::generate_proof`] — fails rather than silently
//!   succeeding when the identity's commitment is absent from the group.
//! - [`ProofBackend::verify_proof`] — a pure function of the proof's own
//!   public fields; callable with no live group or identity state.
//!
//! ## Implementations
//!
//! Two interchangeable backends are registered, selected explicitly per
//! call via [`BackendKind`]:
//!
//! - [`Sha256Backend`] — plain SHA-256 digest accumulator.
//! - [`TaggedSha256Backend`] — domain-separated hashing with distinct
//!   leaf/node prefixes, so its roots, nullifiers, and proof points are
//!   never interchangeable with the plain backend's.
//!
//! Both are **transparent demo schemes**: deterministic, verifiable, and
//! providing **no zero-knowledge guarantees**. They stand in for the real
//! circuit-backed provers, which are outside this repository's boundary.

pub mod sha256;
pub mod tagged;
pub mod traits;

mod digest;

// Re-export primary types.
pub use sha256::Sha256Backend;
pub use tagged::TaggedSha256Backend;
pub use traits::{
    IdentityMaterial, MembershipProof, ProofBackend, ProofError, SecretScalar, VerifyError,
    PROOF_POINTS,
};

/// The registered proof backend implementations.
///
/// Call sites select a backend explicitly by kind — no boolean flags, no
/// hidden default. The kind is a name for a capability, not configuration
/// state: the same proof slot may generate with one backend and (fail to)
/// verify with another, exactly as two incompatible proof libraries would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Plain SHA-256 accumulator scheme.
    Sha256,
    /// Domain-separated SHA-256 scheme with tagged leaf/node hashing.
    TaggedSha256,
}

impl BackendKind {
    /// Every registered backend, in registry order.
    pub const ALL: [BackendKind; 2] = [BackendKind::Sha256, BackendKind::TaggedSha256];

    /// The canonical name of this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::TaggedSha256 => "tagged-sha256",
        }
    }

    /// Resolve the backend implementation for this kind.
    pub fn backend(&self) -> &'static dyn ProofBackend {
        static SHA256: Sha256Backend = Sha256Backend;
        static TAGGED: TaggedSha256Backend = TaggedSha256Backend;
        match self {
            Self::Sha256 => &SHA256,
            Self::TaggedSha256 => &TAGGED,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
