//! # Plain SHA-256 Backend
//!
//! A deterministic, transparent proof backend. Roots are digest
//! accumulators over the ordered member list, nullifiers bind the secret
//! to the scope, and proof points are digests of the public inputs.
//!
//! ## Security Warning
//!
//! **NOT PRIVATE.** Anyone can recompute every value here from the same
//! inputs. The backend exists so the consistency machinery above it can
//! be exercised end to end with real, verifiable artifacts; it stands in
//! for a circuit-backed prover, which is outside this repository's
//! boundary.

use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;

use sigil_core::{Commitment, GroupRecord, MerkleRoot};

use crate::digest::hex_digest;
use crate::traits::{
    IdentityMaterial, MembershipProof, ProofBackend, ProofError, SecretScalar, VerifyError,
    PROOF_POINTS,
};

const DOMAIN_EMPTY: &[u8] = b"sigil.sha256.v1.empty";
const DOMAIN_NODE: &[u8] = b"sigil.sha256.v1.node";
const DOMAIN_COMMITMENT: &[u8] = b"sigil.sha256.v1.commitment";
const DOMAIN_NULLIFIER: &[u8] = b"sigil.sha256.v1.nullifier";
const DOMAIN_POINT: &[u8] = b"sigil.sha256.v1.point";

/// Plain SHA-256 accumulator backend.
pub struct Sha256Backend;

impl Sha256Backend {
    fn point(root: &MerkleRoot, nullifier: &str, message: &str, scope: &str, depth: u32, index: u8) -> String {
        // Length-prefix the variable-length fields so (message, scope)
        // pairs cannot collide by shifting bytes across the boundary.
        hex_digest(&[
            DOMAIN_POINT,
            &[index],
            &depth.to_be_bytes(),
            root.as_str().as_bytes(),
            nullifier.as_bytes(),
            &(message.len() as u64).to_be_bytes(),
            message.as_bytes(),
            &(scope.len() as u64).to_be_bytes(),
            scope.as_bytes(),
        ])
    }

    fn expected_points(proof: &MembershipProof) -> Vec<String> {
        (0..PROOF_POINTS)
            .map(|i| {
                Self::point(
                    &proof.merkle_tree_root,
                    &proof.nullifier,
                    &proof.message,
                    &proof.scope,
                    proof.merkle_tree_depth,
                    i as u8,
                )
            })
            .collect()
    }
}

impl ProofBackend for Sha256Backend {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn create_identity(&self) -> IdentityMaterial {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        let commitment = Commitment::new(hex_digest(&[DOMAIN_COMMITMENT, &secret_bytes]))
            .expect("sha256 digests are canonical 64-char hex");
        IdentityMaterial::new(commitment, SecretScalar::from_bytes(secret_bytes))
    }

    fn empty_root(&self, depth: u32) -> MerkleRoot {
        self.compute_root(depth, &[])
    }

    fn compute_root(&self, depth: u32, members: &[Commitment]) -> MerkleRoot {
        let mut acc = hex_digest(&[DOMAIN_EMPTY, &depth.to_be_bytes()]);
        for member in members {
            acc = hex_digest(&[DOMAIN_NODE, acc.as_bytes(), member.as_str().as_bytes()]);
        }
        MerkleRoot::new(acc).expect("sha256 digests are canonical 64-char hex")
    }

    fn generate_proof(
        &self,
        material: &IdentityMaterial,
        group: &GroupRecord,
        message: &str,
        scope: &str,
    ) -> Result<MembershipProof, ProofError> {
        if group.member_index(&material.commitment).is_none() {
            return Err(ProofError::CommitmentAbsent {
                commitment: material.commitment.clone(),
                member_count: group.member_count(),
            });
        }

        let capacity = 1u64.checked_shl(group.depth).unwrap_or(u64::MAX);
        if group.members.len() as u64 > capacity {
            return Err(ProofError::GenerationFailed(format!(
                "group has {} members, exceeding capacity {} at depth {}",
                group.members.len(),
                capacity,
                group.depth
            )));
        }

        let root = self.compute_root(group.depth, &group.members);
        let nullifier = hex_digest(&[
            DOMAIN_NULLIFIER,
            &(scope.len() as u64).to_be_bytes(),
            scope.as_bytes(),
            material.secret().as_bytes(),
        ]);
        let points = (0..PROOF_POINTS)
            .map(|i| Self::point(&root, &nullifier, message, scope, group.depth, i as u8))
            .collect();

        Ok(MembershipProof {
            merkle_tree_depth: group.depth,
            merkle_tree_root: root,
            nullifier,
            message: message.to_string(),
            scope: scope.to_string(),
            points,
        })
    }

    fn verify_proof(&self, proof: &MembershipProof) -> Result<bool, VerifyError> {
        if proof.points.len() != PROOF_POINTS {
            return Err(VerifyError::MalformedProof(format!(
                "expected {PROOF_POINTS} points, got {}",
                proof.points.len()
            )));
        }
        for point in &proof.points {
            if point.len() != 64 || !point.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(VerifyError::MalformedProof(
                    "point is not a 64-char hex digest".to_string(),
                ));
            }
        }

        let expected = Self::expected_points(proof);
        let mut all_match = subtle::Choice::from(1u8);
        for (have, want) in proof.points.iter().zip(expected.iter()) {
            all_match &= have.as_bytes().ct_eq(want.as_bytes());
        }
        Ok(bool::from(all_match))
    }
}
