//! # Tagged SHA-256 Backend
//!
//! The second registered backend. Same contract as
//! [`Sha256Backend`](crate::Sha256Backend), different scheme: every hash
//! is domain-separated with distinct leaf/node prefix bytes, and members
//! are pre-hashed as tagged leaves before entering the accumulator. The
//! prefixes keep leaf and interior hashes in disjoint domains, so a leaf
//! value can never be confused with an accumulator state.
//!
//! Because the domains differ, nothing this backend produces — roots,
//! nullifiers, commitments, points — verifies under the plain backend,
//! and vice versa. The two coexist the way two independent proof
//! libraries for the same protocol do.
//!
//! Transparent and **NOT PRIVATE**, same as the plain backend.

use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;

use sigil_core::{Commitment, GroupRecord, MerkleRoot};

use crate::digest::hex_digest;
use crate::traits::{
    IdentityMaterial, MembershipProof, ProofBackend, ProofError, SecretScalar, VerifyError,
    PROOF_POINTS,
};

const DOMAIN_EMPTY: &[u8] = b"sigil.tagged.v1.empty";
const DOMAIN_COMMITMENT: &[u8] = b"sigil.tagged.v1.commitment";
const DOMAIN_NULLIFIER: &[u8] = b"sigil.tagged.v1.nullifier";
const DOMAIN_POINT: &[u8] = b"sigil.tagged.v1.point";

/// Leaf-hash prefix byte (disjoint from interior nodes).
const LEAF_PREFIX: &[u8] = &[0x00];
/// Interior-node prefix byte.
const NODE_PREFIX: &[u8] = &[0x01];

/// Domain-separated SHA-256 backend.
pub struct TaggedSha256Backend;

impl TaggedSha256Backend {
    fn leaf(member: &Commitment) -> String {
        hex_digest(&[LEAF_PREFIX, member.as_str().as_bytes()])
    }

    fn point(root: &MerkleRoot, nullifier: &str, message: &str, scope: &str, depth: u32, index: u8) -> String {
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

impl ProofBackend for TaggedSha256Backend {
    fn name(&self) -> &'static str {
        "tagged-sha256"
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
            let leaf = Self::leaf(member);
            acc = hex_digest(&[NODE_PREFIX, acc.as_bytes(), leaf.as_bytes()]);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sha256::Sha256Backend;
    use sigil_core::DEFAULT_TREE_DEPTH;

    fn group_with(backend: &dyn ProofBackend, members: &[Commitment]) -> GroupRecord {
        let mut group = GroupRecord::new("g", DEFAULT_TREE_DEPTH, backend.empty_root(DEFAULT_TREE_DEPTH));
        group.members = members.to_vec();
        group.root = backend.compute_root(group.depth, &group.members);
        group
    }

    #[test]
    fn generate_then_verify_is_valid() {
        let backend = TaggedSha256Backend;
        let identity = backend.create_identity();
        let group = group_with(&backend, &[identity.commitment.clone()]);
        let proof = backend
            .generate_proof(&identity, &group, "Voto_A", "eleccion_presidente_2024")
            .unwrap();
        assert!(backend.verify_proof(&proof).unwrap());
    }

    #[test]
    fn generate_refuses_non_member() {
        let backend = TaggedSha256Backend;
        let outsider = backend.create_identity();
        let group = group_with(&backend, &[]);
        assert!(matches!(
            backend.generate_proof(&outsider, &group, "m", "s"),
            Err(ProofError::CommitmentAbsent { .. })
        ));
    }

    #[test]
    fn roots_disagree_with_plain_backend() {
        let tagged = TaggedSha256Backend;
        let plain = Sha256Backend;
        let member = tagged.create_identity().commitment;
        assert_ne!(tagged.empty_root(20), plain.empty_root(20));
        assert_ne!(
            tagged.compute_root(20, std::slice::from_ref(&member)),
            plain.compute_root(20, std::slice::from_ref(&member)),
        );
    }

    #[test]
    fn plain_proof_does_not_verify_under_tagged_backend() {
        let plain = Sha256Backend;
        let tagged = TaggedSha256Backend;
        let identity = plain.create_identity();
        let group = group_with(&plain, &[identity.commitment.clone()]);
        let proof = plain.generate_proof(&identity, &group, "m", "s").unwrap();
        assert!(plain.verify_proof(&proof).unwrap());
        assert!(!tagged.verify_proof(&proof).unwrap());
    }

    #[test]
    fn tagged_proof_does_not_verify_under_plain_backend() {
        let plain = Sha256Backend;
        let tagged = TaggedSha256Backend;
        let identity = tagged.create_identity();
        let group = group_with(&tagged, &[identity.commitment.clone()]);
        let proof = tagged.generate_proof(&identity, &group, "m", "s").unwrap();
        assert!(tagged.verify_proof(&proof).unwrap());
        assert!(!plain.verify_proof(&proof).unwrap());
    }

    #[test]
    fn leaf_domain_is_disjoint_from_node_domain() {
        // A single-member accumulator state must never equal the leaf
        // hash of that member.
        let backend = TaggedSha256Backend;
        let member = backend.create_identity().commitment;
        let root = backend.compute_root(20, std::slice::from_ref(&member));
        assert_ne!(root.as_str(), TaggedSha256Backend::leaf(&member));
    }

    #[test]
    fn tampered_nullifier_fails_verification() {
        let backend = TaggedSha256Backend;
        let identity = backend.create_identity();
        let group = group_with(&backend, &[identity.commitment.clone()]);
        let mut proof = backend.generate_proof(&identity, &group, "m", "s").unwrap();
        proof.nullifier = "f".repeat(64);
        assert!(!backend.verify_proof(&proof).unwrap());
    }
}
