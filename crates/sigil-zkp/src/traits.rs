//! # Proof Backend Contract
//!
//! The capability interface every proof backend implements, plus the
//! types that cross it: [`IdentityMaterial`] (the only place a secret
//! exists), [`MembershipProof`] (the signal-bound artifact), and the
//! generation/verification error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use sigil_core::{Commitment, GroupRecord, MerkleRoot};

/// Number of opaque points in a proof payload.
///
/// Matches the three-curve-point layout of a Groth16-style argument
/// (A, B as a 2x2, C) flattened to eight coordinates.
pub const PROOF_POINTS: usize = 8;

/// An identity's private secret scalar.
///
/// Held only in transient memory and zeroized on drop. Deliberately not
/// serializable: persisting any derived secret material would defeat the
/// anonymity guarantee, so the type system forbids it. `Debug` is
/// redacted.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretScalar([u8; 32]);

impl SecretScalar {
    /// Wrap raw secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The narrow accessor backends use to sign.
    ///
    /// This is the one sanctioned way to read the secret — there is no
    /// string form, no serialization, and no fallback property probing.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretScalar(redacted)")
    }
}

/// A freshly minted identity: public commitment plus private secret.
///
/// Created once by a backend and handed to the caller exactly once. The
/// commitment may be persisted (it is the public identifier); the secret
/// lives only as long as this value does.
#[derive(Debug, Clone)]
pub struct IdentityMaterial {
    /// Public commitment derived from the secret.
    pub commitment: Commitment,
    secret: SecretScalar,
}

impl IdentityMaterial {
    /// Assemble identity material from a commitment and its secret.
    pub fn new(commitment: Commitment, secret: SecretScalar) -> Self {
        Self { commitment, secret }
    }

    /// The private secret, for signing only.
    pub fn secret(&self) -> &SecretScalar {
        &self.secret
    }
}

/// A signal-bound membership proof.
///
/// All fields are public inputs except `points`, the opaque argument
/// payload. Verification is a pure function of this value alone — the
/// embedded `merkle_tree_root` is the set the proof attests to, whether
/// or not any live group still has that root. A verification result is
/// never stored here; the lifecycle controller owns that tri-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    /// Tree depth of the group at generation time.
    pub merkle_tree_depth: u32,
    /// Root of the exact membership set the proof was generated against.
    pub merkle_tree_root: MerkleRoot,
    /// Derived value unique to the (identity, scope) pair. Two proofs
    /// sharing a scope and an identity carry the same nullifier, which is
    /// what makes repeat signaling detectable.
    pub nullifier: String,
    /// The public payload the member attests to.
    pub message: String,
    /// The public context tag (external nullifier).
    pub scope: String,
    /// Opaque argument payload, uninterpreted by everything but the
    /// backend that produced it.
    pub points: Vec<String>,
}

/// Proof generation failures.
#[derive(Error, Debug)]
pub enum ProofError {
    /// The identity's commitment is not an element of the group's
    /// membership set. Generating a proof for a non-member is refused,
    /// never silently faked.
    #[error(
        "commitment {commitment} is not a member of the group ({member_count} members)"
    )]
    CommitmentAbsent {
        /// The commitment that was looked up.
        commitment: Commitment,
        /// Size of the membership set that was searched.
        member_count: usize,
    },

    /// The backend failed to produce a proof.
    #[error("proof generation failed: {0}")]
    GenerationFailed(String),
}

/// Proof verification failures.
///
/// Distinct from a clean `Ok(false)` mismatch: these mean the payload
/// could not be checked at all.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The proof payload is structurally invalid.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
}

/// The opaque proof capability.
///
/// Implementations must be deterministic in everything except
/// [`create_identity`](Self::create_identity), and verification must be
/// callable independent of any live group or identity state.
pub trait ProofBackend: Send + Sync {
    /// The canonical name of this backend, for diagnostics.
    fn name(&self) -> &'static str;

    /// Mint a fresh `(commitment, secret)` pair.
    ///
    /// The secret must not be derivable from the commitment.
    fn create_identity(&self) -> IdentityMaterial;

    /// Deterministic root of the empty membership set at `depth`.
    fn empty_root(&self, depth: u32) -> MerkleRoot;

    /// Deterministic, order-sensitive root of `(depth, members)`.
    ///
    /// Pure: equal inputs always produce equal roots, across process
    /// restarts and re-hydrated member lists.
    fn compute_root(&self, depth: u32, members: &[Commitment]) -> MerkleRoot;

    /// Append a commitment to a group, returning the updated group with
    /// its root recomputed.
    ///
    /// Pure and append-only: the input group is untouched, the output
    /// differs only in `members` (one new trailing entry) and `root`.
    fn add_member(&self, group: &GroupRecord, commitment: Commitment) -> GroupRecord {
        let mut next = group.clone();
        next.members.push(commitment);
        next.root = self.compute_root(next.depth, &next.members);
        next
    }

    /// Generate a proof that `material` is a member of `group`, bound to
    /// `message` within `scope`.
    ///
    /// # Errors
    ///
    /// [`ProofError::CommitmentAbsent`] if the material's commitment is
    /// not in `group.members` — this must fail, not silently succeed.
    fn generate_proof(
        &self,
        material: &IdentityMaterial,
        group: &GroupRecord,
        message: &str,
        scope: &str,
    ) -> Result<MembershipProof, ProofError>;

    /// Verify a proof against the public inputs it carries.
    ///
    /// Pure and side-effect free. `Ok(false)` is a clean mismatch;
    /// [`VerifyError`] means the payload was structurally unverifiable.
    fn verify_proof(&self, proof: &MembershipProof) -> Result<bool, VerifyError>;
}
