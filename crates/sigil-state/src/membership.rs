//! # Membership Synchronizer
//!
//! Groups are reconstructed from persisted primitive data (a list of
//! commitment strings), so a reload can produce an in-memory group that
//! was rebuilt independently of the flag that says membership succeeded.
//! This module detects that divergence and repairs it.
//!
//! The repair policy is asymmetric by design. The membership flag is the
//! record of explicit user intent (the user performed "add to group");
//! list containment is the record of effect. Reconciliation makes effect
//! catch up to intent — a claimed member whose commitment is missing is
//! appended — but never the reverse: an unclaimed commitment that happens
//! to be present does not promote anyone to member.

use sigil_core::{Commitment, GroupRecord};
use sigil_zkp::ProofBackend;

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The group after reconciliation. Root recomputed iff repaired.
    pub group: GroupRecord,
    /// The membership state after reconciliation (the intent flag,
    /// which repair has made effective).
    pub is_member: bool,
    /// Whether the group was mutated. When true the caller must
    /// re-persist the group and must invalidate any previously generated
    /// proof — the root changed.
    pub repaired: bool,
}

/// Whether `commitment` appears in `group.members`.
///
/// Pure, O(|members|), value equality on the canonical commitment form —
/// never object identity, because commitments are re-hydrated across
/// reloads. Order-independent, although member order determines tree
/// indices elsewhere.
pub fn verify_membership(commitment: &Commitment, group: &GroupRecord) -> bool {
    group.contains(commitment)
}

/// Reconcile the membership flag against actual containment.
///
/// If `claimed_member` is true but the commitment is absent, the claim
/// is treated as authoritative intent: the commitment is appended and
/// the root recomputed. If `claimed_member` is false, the group is left
/// untouched regardless of actual containment.
pub fn reconcile(
    commitment: &Commitment,
    group: GroupRecord,
    claimed_member: bool,
    backend: &dyn ProofBackend,
) -> Reconciliation {
    let contained = verify_membership(commitment, &group);

    if claimed_member && !contained {
        tracing::warn!(
            commitment = %commitment,
            members = group.member_count(),
            "membership claimed but commitment missing from group, appending"
        );
        return Reconciliation {
            group: backend.add_member(&group, commitment.clone()),
            is_member: true,
            repaired: true,
        };
    }

    Reconciliation {
        group,
        is_member: claimed_member,
        repaired: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::DEFAULT_TREE_DEPTH;
    use sigil_zkp::BackendKind;

    fn backend() -> &'static dyn ProofBackend {
        BackendKind::Sha256.backend()
    }

    fn empty_group() -> GroupRecord {
        GroupRecord::new(
            "g",
            DEFAULT_TREE_DEPTH,
            backend().empty_root(DEFAULT_TREE_DEPTH),
        )
    }

    #[test]
    fn verify_membership_is_value_equality() {
        let identity = backend().create_identity();
        let mut group = empty_group();
        assert!(!verify_membership(&identity.commitment, &group));

        group.members.push(identity.commitment.clone());
        // A re-hydrated copy of the same canonical value must match.
        let rehydrated = Commitment::new(identity.commitment.as_str()).unwrap();
        assert!(verify_membership(&rehydrated, &group));
    }

    #[test]
    fn claimed_and_contained_is_a_clean_pass() {
        let identity = backend().create_identity();
        let mut group = empty_group();
        group.members.push(identity.commitment.clone());
        group.root = backend().compute_root(group.depth, &group.members);
        let before = group.clone();

        let outcome = reconcile(&identity.commitment, group, true, backend());
        assert!(outcome.is_member);
        assert!(!outcome.repaired);
        assert_eq!(outcome.group, before);
    }

    #[test]
    fn claimed_but_absent_appends_and_recomputes_root() {
        let identity = backend().create_identity();
        let group = empty_group();
        let empty_root = group.root.clone();

        let outcome = reconcile(&identity.commitment, group, true, backend());
        assert!(outcome.is_member);
        assert!(outcome.repaired);
        assert!(outcome.group.contains(&identity.commitment));
        assert_ne!(outcome.group.root, empty_root);
        assert_eq!(
            outcome.group.root,
            backend().compute_root(outcome.group.depth, &outcome.group.members)
        );
    }

    #[test]
    fn unclaimed_never_promotes_even_when_contained() {
        let identity = backend().create_identity();
        let mut group = empty_group();
        group.members.push(identity.commitment.clone());
        group.root = backend().compute_root(group.depth, &group.members);
        let before = group.clone();

        let outcome = reconcile(&identity.commitment, group, false, backend());
        assert!(!outcome.is_member);
        assert!(!outcome.repaired);
        assert_eq!(outcome.group, before);
    }

    #[test]
    fn unclaimed_and_absent_leaves_group_untouched() {
        let identity = backend().create_identity();
        let group = empty_group();
        let before = group.clone();

        let outcome = reconcile(&identity.commitment, group, false, backend());
        assert!(!outcome.is_member);
        assert!(!outcome.repaired);
        assert_eq!(outcome.group, before);
    }

    #[test]
    fn repair_appends_at_the_tail() {
        let first = backend().create_identity();
        let second = backend().create_identity();
        let mut group = empty_group();
        group.members.push(first.commitment.clone());
        group.root = backend().compute_root(group.depth, &group.members);

        let outcome = reconcile(&second.commitment, group, true, backend());
        assert_eq!(outcome.group.member_index(&second.commitment), Some(1));
    }
}
