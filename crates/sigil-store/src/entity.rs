//! # Entity Store
//!
//! The canonical, persisted mapping from identifier to [`GroupRecord`] /
//! [`IdentityRecord`]. All mutation of groups and identities in the
//! workspace goes through here.
//!
//! ## Write-through
//!
//! Every mutating operation synchronously persists the full updated
//! document before returning. On a failed write the in-memory state
//! remains whatever the operation left it — there is no rollback of the
//! attempted logical operation; the error surfaces and the next
//! successful write re-converges the document.
//!
//! ## Root invariant
//!
//! A group's `root` is recomputed from `(depth, members)` by the proof
//! backend on every membership change; the store never accepts a
//! hand-edited root.

use std::collections::BTreeMap;

use thiserror::Error;

use sigil_core::{
    Commitment, GroupId, GroupRecord, IdentityId, IdentityRecord, ValidationError,
    DEFAULT_TREE_DEPTH,
};
use sigil_zkp::{IdentityMaterial, ProofBackend};

use crate::kv::{KeyValueStore, StorageError};

/// Fixed key of the groups document.
pub const GROUPS_KEY: &str = "groups";
/// Fixed key of the identities document.
pub const IDENTITIES_KEY: &str = "identities";

/// Entity store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Persistence read/write failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A persisted document could not be decoded. Unlike a missing key
    /// (an empty store), malformed content is surfaced, not silently
    /// replaced with an empty map.
    #[error("failed to decode persisted {key:?} document: {source}")]
    Serialization {
        /// The storage key whose document failed to decode.
        key: &'static str,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Operation referenced an unknown group id. Callers treat this as a
    /// local no-op.
    #[error("unknown group: {0}")]
    GroupNotFound(GroupId),

    /// Operation referenced an unknown identity id. Callers treat this
    /// as a local no-op.
    #[error("unknown identity: {0}")]
    IdentityNotFound(IdentityId),

    /// Rejected user input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One row of the derived membership join.
///
/// Membership is not stored independently: the pair (identity, group) is
/// a membership iff the group's member list contains the identity's
/// commitment. Enumerating memberships is therefore a full join between
/// identities and group member lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRow {
    /// The group the commitment appears in.
    pub group_id: GroupId,
    /// Group label, for display.
    pub group_name: String,
    /// The member's tree index within the group.
    pub member_index: usize,
    /// The commitment baked into the tree.
    pub commitment: Commitment,
    /// The identity record matching the commitment, if one still exists.
    /// `None` means the identity was removed; the membership itself
    /// cannot be retracted.
    pub identity: Option<IdentityRecord>,
}

/// Aggregate counters over the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Number of groups.
    pub groups: usize,
    /// Number of identity records.
    pub identities: usize,
    /// Sum of member-list lengths across all groups.
    pub total_members: usize,
}

/// Canonical owner of groups and identities, persisted write-through.
pub struct EntityStore {
    groups: BTreeMap<GroupId, GroupRecord>,
    identities: BTreeMap<IdentityId, IdentityRecord>,
    kv: Box<dyn KeyValueStore>,
}

impl EntityStore {
    /// Open the store, loading both documents from persistence.
    ///
    /// Absent keys mean an empty store; malformed documents surface
    /// [`StoreError::Serialization`].
    pub fn open(kv: Box<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let groups: BTreeMap<GroupId, GroupRecord> = match kv.read(GROUPS_KEY)? {
            Some(doc) => serde_json::from_str(&doc).map_err(|source| {
                StoreError::Serialization {
                    key: GROUPS_KEY,
                    source,
                }
            })?,
            None => BTreeMap::new(),
        };
        let identities: BTreeMap<IdentityId, IdentityRecord> = match kv.read(IDENTITIES_KEY)? {
            Some(doc) => serde_json::from_str(&doc).map_err(|source| {
                StoreError::Serialization {
                    key: IDENTITIES_KEY,
                    source,
                }
            })?,
            None => BTreeMap::new(),
        };
        tracing::debug!(
            groups = groups.len(),
            identities = identities.len(),
            "entity store loaded"
        );
        Ok(Self {
            groups,
            identities,
            kv,
        })
    }

    /// Create an empty group at the fixed depth and persist it.
    pub fn create_group(
        &mut self,
        name: impl Into<String>,
        backend: &dyn ProofBackend,
    ) -> Result<GroupId, StoreError> {
        let id = GroupId::new();
        let record = GroupRecord::new(name, DEFAULT_TREE_DEPTH, backend.empty_root(DEFAULT_TREE_DEPTH));
        self.groups.insert(id, record);
        self.persist_groups()?;
        Ok(id)
    }

    /// Mint a fresh identity, persist its public record, and hand the
    /// transient material (commitment + secret) back to the caller
    /// exactly once. Only the record is stored.
    ///
    /// An empty or blank name is rejected before any cryptographic work.
    pub fn create_identity(
        &mut self,
        name: &str,
        backend: &dyn ProofBackend,
    ) -> Result<(IdentityId, IdentityMaterial), StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName { what: "identity" }.into());
        }
        let material = backend.create_identity();
        let id = IdentityId::new();
        let record = IdentityRecord::new(id, name, material.commitment.clone());
        self.identities.insert(id, record);
        self.persist_identities()?;
        Ok((id, material))
    }

    /// Append a commitment to a group's membership set and recompute the
    /// root. Appending a commitment that is already present is a silent
    /// no-op: members and root are unchanged and nothing is re-persisted.
    pub fn add_member(
        &mut self,
        group_id: GroupId,
        commitment: Commitment,
        backend: &dyn ProofBackend,
    ) -> Result<(), StoreError> {
        let group = self
            .groups
            .get_mut(&group_id)
            .ok_or(StoreError::GroupNotFound(group_id))?;
        if group.contains(&commitment) {
            tracing::debug!(group = %group_id, commitment = %commitment, "duplicate member append ignored");
            return Ok(());
        }
        *group = backend.add_member(group, commitment);
        self.persist_groups()
    }

    /// Delete an identity record. Does not touch any group's member
    /// list: the commitment is already baked into the tree root and
    /// cannot be un-committed without rebuilding the whole tree.
    pub fn remove_identity(&mut self, identity_id: IdentityId) -> Result<(), StoreError> {
        if self.identities.remove(&identity_id).is_none() {
            return Err(StoreError::IdentityNotFound(identity_id));
        }
        self.persist_identities()
    }

    /// Replace a group wholesale and persist. This is the re-persist
    /// path used after reconciliation has repaired a group outside the
    /// store.
    pub fn replace_group(
        &mut self,
        group_id: GroupId,
        record: GroupRecord,
    ) -> Result<(), StoreError> {
        if !self.groups.contains_key(&group_id) {
            return Err(StoreError::GroupNotFound(group_id));
        }
        self.groups.insert(group_id, record);
        self.persist_groups()
    }

    /// Read-only view of a group.
    pub fn group(&self, group_id: GroupId) -> Option<&GroupRecord> {
        self.groups.get(&group_id)
    }

    /// Read-only view of an identity record.
    pub fn identity(&self, identity_id: IdentityId) -> Option<&IdentityRecord> {
        self.identities.get(&identity_id)
    }

    /// Read-only view of all groups, ordered by id.
    pub fn groups(&self) -> &BTreeMap<GroupId, GroupRecord> {
        &self.groups
    }

    /// Read-only view of all identity records, ordered by id.
    pub fn identities(&self) -> &BTreeMap<IdentityId, IdentityRecord> {
        &self.identities
    }

    /// Whether the identity's commitment appears in the group's member
    /// list. `false` when either id is unknown.
    pub fn is_member(&self, identity_id: IdentityId, group_id: GroupId) -> bool {
        match (self.identities.get(&identity_id), self.groups.get(&group_id)) {
            (Some(identity), Some(group)) => group.contains(&identity.commitment),
            _ => false,
        }
    }

    /// The full membership join: every commitment in every group,
    /// matched against identity records by commitment value.
    pub fn memberships(&self) -> Vec<MembershipRow> {
        let mut rows = Vec::new();
        for (group_id, group) in &self.groups {
            for (member_index, commitment) in group.members.iter().enumerate() {
                let identity = self
                    .identities
                    .values()
                    .find(|record| record.commitment == *commitment)
                    .cloned();
                rows.push(MembershipRow {
                    group_id: *group_id,
                    group_name: group.name.clone(),
                    member_index,
                    commitment: commitment.clone(),
                    identity,
                });
            }
        }
        rows
    }

    /// Aggregate counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            groups: self.groups.len(),
            identities: self.identities.len(),
            total_members: self.groups.values().map(GroupRecord::member_count).sum(),
        }
    }

    fn persist_groups(&self) -> Result<(), StoreError> {
        let doc = serde_json::to_string(&self.groups).map_err(|source| {
            StoreError::Serialization {
                key: GROUPS_KEY,
                source,
            }
        })?;
        self.kv.write(GROUPS_KEY, &doc)?;
        Ok(())
    }

    fn persist_identities(&self) -> Result<(), StoreError> {
        let doc = serde_json::to_string(&self.identities).map_err(|source| {
            StoreError::Serialization {
                key: IDENTITIES_KEY,
                source,
            }
        })?;
        self.kv.write(IDENTITIES_KEY, &doc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use sigil_zkp::BackendKind;
    use std::sync::Arc;

    fn backend() -> &'static dyn ProofBackend {
        BackendKind::Sha256.backend()
    }

    fn open_empty() -> EntityStore {
        EntityStore::open(Box::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn create_group_starts_empty_with_empty_root() {
        let mut store = open_empty();
        let id = store.create_group("voters", backend()).unwrap();
        let group = store.group(id).unwrap();
        assert_eq!(group.depth, DEFAULT_TREE_DEPTH);
        assert!(group.members.is_empty());
        assert_eq!(group.root, backend().empty_root(DEFAULT_TREE_DEPTH));
    }

    #[test]
    fn create_identity_stores_only_public_record() {
        let mut store = open_empty();
        let (id, material) = store.create_identity("alice", backend()).unwrap();
        let record = store.identity(id).unwrap();
        assert_eq!(record.name, "alice");
        assert_eq!(record.commitment, material.commitment);
    }

    #[test]
    fn create_identity_rejects_blank_name() {
        let mut store = open_empty();
        assert!(matches!(
            store.create_identity("", backend()),
            Err(StoreError::Validation(ValidationError::EmptyName { .. }))
        ));
        assert!(matches!(
            store.create_identity("   ", backend()),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.stats().identities, 0);
    }

    #[test]
    fn add_member_appends_and_recomputes_root() {
        let mut store = open_empty();
        let group_id = store.create_group("g", backend()).unwrap();
        let (_, material) = store.create_identity("alice", backend()).unwrap();
        let empty_root = store.group(group_id).unwrap().root.clone();

        store
            .add_member(group_id, material.commitment.clone(), backend())
            .unwrap();

        let group = store.group(group_id).unwrap();
        assert_eq!(group.members, vec![material.commitment.clone()]);
        assert_ne!(group.root, empty_root);
        assert_eq!(
            group.root,
            backend().compute_root(group.depth, &group.members)
        );
    }

    #[test]
    fn add_member_is_idempotent_for_duplicates() {
        let mut store = open_empty();
        let group_id = store.create_group("g", backend()).unwrap();
        let (_, material) = store.create_identity("alice", backend()).unwrap();

        store
            .add_member(group_id, material.commitment.clone(), backend())
            .unwrap();
        let after_first = store.group(group_id).unwrap().clone();

        store
            .add_member(group_id, material.commitment.clone(), backend())
            .unwrap();
        let after_second = store.group(group_id).unwrap();
        assert_eq!(*after_second, after_first);
        assert_eq!(after_second.member_count(), 1);
    }

    #[test]
    fn add_member_to_unknown_group_is_an_error() {
        let mut store = open_empty();
        let (_, material) = store.create_identity("alice", backend()).unwrap();
        assert!(matches!(
            store.add_member(GroupId::new(), material.commitment, backend()),
            Err(StoreError::GroupNotFound(_))
        ));
    }

    #[test]
    fn remove_identity_does_not_retract_membership() {
        let mut store = open_empty();
        let group_id = store.create_group("g", backend()).unwrap();
        let (identity_id, material) = store.create_identity("alice", backend()).unwrap();
        store
            .add_member(group_id, material.commitment.clone(), backend())
            .unwrap();
        let root_before = store.group(group_id).unwrap().root.clone();

        store.remove_identity(identity_id).unwrap();

        assert!(store.identity(identity_id).is_none());
        let group = store.group(group_id).unwrap();
        assert!(group.contains(&material.commitment));
        assert_eq!(group.root, root_before);
    }

    #[test]
    fn remove_unknown_identity_is_an_error() {
        let mut store = open_empty();
        assert!(matches!(
            store.remove_identity(IdentityId::new()),
            Err(StoreError::IdentityNotFound(_))
        ));
    }

    #[test]
    fn reload_roundtrip_is_deep_equal() {
        let kv = Arc::new(MemoryStore::new());
        let mut store = EntityStore::open(Box::new(SharedStore(kv.clone()))).unwrap();
        let group_id = store.create_group("voters", backend()).unwrap();
        let (identity_id, material) = store.create_identity("alice", backend()).unwrap();
        store
            .add_member(group_id, material.commitment, backend())
            .unwrap();

        let reloaded = EntityStore::open(Box::new(SharedStore(kv))).unwrap();
        assert_eq!(reloaded.groups(), store.groups());
        assert_eq!(reloaded.identities(), store.identities());
        assert!(reloaded.is_member(identity_id, group_id));
    }

    #[test]
    fn open_surfaces_malformed_documents() {
        let kv = MemoryStore::new();
        kv.write(GROUPS_KEY, "{not json").unwrap();
        assert!(matches!(
            EntityStore::open(Box::new(kv)),
            Err(StoreError::Serialization { key: GROUPS_KEY, .. })
        ));
    }

    #[test]
    fn memberships_join_matches_by_commitment_value() {
        let mut store = open_empty();
        let group_id = store.create_group("g", backend()).unwrap();
        let (_, alice) = store.create_identity("alice", backend()).unwrap();
        let (bob_id, bob) = store.create_identity("bob", backend()).unwrap();
        store
            .add_member(group_id, alice.commitment.clone(), backend())
            .unwrap();
        store
            .add_member(group_id, bob.commitment.clone(), backend())
            .unwrap();
        store.remove_identity(bob_id).unwrap();

        let rows = store.memberships();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].member_index, 0);
        assert_eq!(rows[0].identity.as_ref().unwrap().name, "alice");
        // Bob's record is gone but his membership is still in the tree.
        assert_eq!(rows[1].commitment, bob.commitment);
        assert!(rows[1].identity.is_none());
    }

    #[test]
    fn stats_counts_groups_identities_and_members() {
        let mut store = open_empty();
        let g1 = store.create_group("a", backend()).unwrap();
        let g2 = store.create_group("b", backend()).unwrap();
        let (_, m1) = store.create_identity("x", backend()).unwrap();
        let (_, m2) = store.create_identity("y", backend()).unwrap();
        store.add_member(g1, m1.commitment.clone(), backend()).unwrap();
        store.add_member(g2, m1.commitment, backend()).unwrap();
        store.add_member(g2, m2.commitment, backend()).unwrap();

        let stats = store.stats();
        assert_eq!(stats.groups, 2);
        assert_eq!(stats.identities, 2);
        assert_eq!(stats.total_members, 3);
    }

    #[test]
    fn failed_write_surfaces_and_leaves_memory_state() {
        let mut store = EntityStore::open(Box::new(FailAfter(std::cell::Cell::new(0)))).unwrap();
        let result = store.create_group("g", backend());
        assert!(matches!(result, Err(StoreError::Storage(_))));
        // No rollback of the attempted logical operation.
        assert_eq!(store.stats().groups, 1);
    }

    /// Test double sharing one MemoryStore across EntityStore instances.
    struct SharedStore(Arc<MemoryStore>);

    impl KeyValueStore for SharedStore {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.read(key)
        }
        fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.0.write(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key)
        }
    }

    /// Test double that fails every write after the first N allowed.
    struct FailAfter(std::cell::Cell<usize>);

    impl KeyValueStore for FailAfter {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            if self.0.get() == 0 {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.0.set(self.0.get() - 1);
            Ok(())
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }
}
