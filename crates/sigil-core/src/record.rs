//! # Persisted Records
//!
//! The durable shape of a group and an identity. These are the values the
//! entity store serializes; everything else (identity secrets, proof
//! verification results) is transient by design.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, MerkleRoot};
use crate::id::IdentityId;

/// Fixed Merkle-tree depth for every group.
pub const DEFAULT_TREE_DEPTH: u32 = 20;

/// A group's persisted state: an ordered, append-only membership set and
/// the root that summarizes it.
///
/// Member order is significant — it determines each member's tree index,
/// which a proof's Merkle path depends on. `root` must equal the backend's
/// digest of `(depth, members)` whenever the group is settled; the entity
/// store recomputes it on every mutation, and load paths rebuild it from
/// `members` rather than trusting a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// User-facing label. Mutable only by recreation.
    pub name: String,
    /// Fixed tree depth, immutable after creation.
    pub depth: u32,
    /// Ordered commitment list. Append-only: this protocol has no member
    /// removal, because a commitment is already baked into the tree root.
    pub members: Vec<Commitment>,
    /// Digest of `(depth, members)`. Recomputed, never hand-edited.
    pub root: MerkleRoot,
    /// Creation timestamp (ISO-8601 on the wire).
    pub created_at: DateTime<Utc>,
}

impl GroupRecord {
    /// Construct an empty group at the given depth with its empty-set root.
    pub fn new(name: impl Into<String>, depth: u32, empty_root: MerkleRoot) -> Self {
        Self {
            name: name.into(),
            depth,
            members: Vec::new(),
            root: empty_root,
            created_at: Utc::now(),
        }
    }

    /// Whether the commitment appears in the membership set.
    ///
    /// Value equality on the canonical string — order does not matter for
    /// this check, even though it matters for tree indices.
    pub fn contains(&self, commitment: &Commitment) -> bool {
        self.members.iter().any(|m| m == commitment)
    }

    /// The tree index of a commitment, if present.
    pub fn member_index(&self, commitment: &Commitment) -> Option<usize> {
        self.members.iter().position(|m| m == commitment)
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// An identity's persisted state.
///
/// Holds only public data: the storage id, a label, and the commitment.
/// The private secret exists solely in transient memory (see the proof
/// backend's identity material) and is never written here. Removing a
/// record does not retract prior memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Storage key, distinct from the cryptographic commitment.
    pub id: IdentityId,
    /// User-facing label.
    pub name: String,
    /// Public commitment derived from the private secret.
    pub commitment: Commitment,
    /// Creation timestamp (ISO-8601 on the wire).
    pub created_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// Construct a record for a freshly minted identity.
    pub fn new(id: IdentityId, name: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            id,
            name: name.into(),
            commitment,
            created_at: Utc::now(),
        }
    }
}
