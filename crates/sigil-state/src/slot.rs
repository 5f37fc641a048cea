//! # Walkthrough Slot
//!
//! The persisted single-slot flow: one group, one identity, one proof,
//! walked through end to end. The slot is what makes the consistency
//! problem concrete — its group is reconstructed from a bare member list
//! on every load, so the membership flag, the rebuilt group, and a
//! stored proof all have to be re-converged before anything else runs.
//!
//! Load-time rules:
//!
//! - The group root is always recomputed from the persisted members,
//!   never trusted from disk.
//! - If membership is claimed, the slot reconciles (appending a missing
//!   commitment); a repair changes the root, so any stored proof is
//!   discarded.
//! - Verification state is never persisted and always starts `Unknown`.
//! - The identity is persisted as its public record only. The secret
//!   does not survive a reload: a stored proof can still be verified
//!   (verification is pure on the proof), but generating a new proof
//!   requires minting a fresh identity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sigil_core::{
    Commitment, GroupRecord, IdentityId, IdentityRecord, ValidationError, DEFAULT_TREE_DEPTH,
};
use sigil_store::{KeyValueStore, StorageError};
use sigil_zkp::{IdentityMaterial, MembershipProof, ProofBackend};

use crate::membership;
use crate::proof::{
    InvalidationReason, LifecycleError, ProofLifecycleController, ProofPhase, Verification,
};

/// Fixed key of the walkthrough document.
pub const WALKTHROUGH_KEY: &str = "walkthrough";

/// Default signal (the public message).
pub const DEFAULT_SIGNAL: &str = "Voto_A";

/// Default scope (the external nullifier).
pub const DEFAULT_SCOPE: &str = "eleccion_presidente_2024";

/// Persisted shape of the slot's group: just the ordered member list.
/// Depth is the fixed constant and the root is recomputed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotGroup {
    members: Vec<Commitment>,
}

/// The persisted walkthrough document.
///
/// Verification state is deliberately absent: it must be re-established
/// after every reload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SlotRecord {
    /// The group's member list, if a group was created.
    #[serde(default)]
    group: Option<SlotGroup>,
    /// The identity's public record, if one was minted. Never a secret.
    #[serde(default)]
    identity: Option<IdentityRecord>,
    /// The membership intent flag.
    #[serde(default)]
    is_member: bool,
    /// The generated proof, if any.
    #[serde(default)]
    proof: Option<MembershipProof>,
    /// The signal last used.
    #[serde(default)]
    signal: String,
    /// The scope last used.
    #[serde(default)]
    external_nullifier: String,
}

/// Walkthrough slot failures.
#[derive(Error, Debug)]
pub enum SlotError {
    /// Rejected user input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence read/write failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The persisted walkthrough document could not be decoded.
    #[error("failed to decode persisted walkthrough document: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The proof lifecycle refused the operation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A step was attempted before its prerequisite exists.
    #[error("{0} is required before this step")]
    Missing(&'static str),
}

/// The in-memory walkthrough: one group, one identity, one proof slot.
pub struct Walkthrough {
    group: Option<GroupRecord>,
    identity: Option<IdentityRecord>,
    /// Transient signing material; never persisted, gone after reload.
    material: Option<IdentityMaterial>,
    is_member: bool,
    signal: String,
    external_nullifier: String,
    controller: ProofLifecycleController,
}

impl Walkthrough {
    /// A fresh slot with default signal and scope.
    pub fn new() -> Self {
        Self {
            group: None,
            identity: None,
            material: None,
            is_member: false,
            signal: DEFAULT_SIGNAL.to_string(),
            external_nullifier: DEFAULT_SCOPE.to_string(),
            controller: ProofLifecycleController::new(),
        }
    }

    // ── Steps ────────────────────────────────────────────────────────

    /// Step 1: create the group (empty, fixed depth).
    ///
    /// Replaces any existing group, clears the membership flag, and
    /// invalidates any proof — the attested set no longer exists.
    pub fn create_group(&mut self, backend: &dyn ProofBackend) {
        self.group = Some(GroupRecord::new(
            "walkthrough",
            DEFAULT_TREE_DEPTH,
            backend.empty_root(DEFAULT_TREE_DEPTH),
        ));
        self.is_member = false;
        self.controller.invalidate(InvalidationReason::RootChanged);
    }

    /// Step 2: mint the identity.
    ///
    /// Replaces any existing identity (the new commitment is not a
    /// member of anything yet) and invalidates any proof.
    pub fn create_identity(
        &mut self,
        name: &str,
        backend: &dyn ProofBackend,
    ) -> Result<(), SlotError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName { what: "identity" }.into());
        }
        let material = backend.create_identity();
        self.identity = Some(IdentityRecord::new(
            IdentityId::new(),
            name,
            material.commitment.clone(),
        ));
        self.material = Some(material);
        self.is_member = false;
        self.controller
            .invalidate(InvalidationReason::MembershipChanged);
        Ok(())
    }

    /// Step 3: attach the identity to the group.
    ///
    /// Appends the commitment (no-op if already present), recomputes the
    /// root, sets the intent flag, and discards any proof — membership
    /// changed.
    pub fn join_group(&mut self, backend: &dyn ProofBackend) -> Result<(), SlotError> {
        let identity = self.identity.as_ref().ok_or(SlotError::Missing("identity"))?;
        let group = self.group.as_mut().ok_or(SlotError::Missing("group"))?;

        if !group.contains(&identity.commitment) {
            *group = backend.add_member(group, identity.commitment.clone());
        }
        self.is_member = true;
        self.controller
            .invalidate(InvalidationReason::MembershipChanged);
        Ok(())
    }

    /// Step 4: generate the proof for the current signal and scope.
    pub fn generate_proof(&mut self, backend: &dyn ProofBackend) -> Result<(), SlotError> {
        let group = self.group.as_ref().ok_or(SlotError::Missing("group"))?;
        let material = self
            .material
            .as_ref()
            .ok_or(SlotError::Missing("identity secret (mint a new identity after a reload)"))?;
        self.controller.generate(
            material,
            group,
            &self.signal,
            &self.external_nullifier,
            backend,
        )?;
        Ok(())
    }

    /// Step 5: verify the stored proof.
    pub fn verify_proof(&mut self, backend: &dyn ProofBackend) -> Result<bool, SlotError> {
        Ok(self.controller.verify(backend)?)
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Set the signal used for the next generation.
    pub fn set_signal(&mut self, signal: impl Into<String>) {
        self.signal = signal.into();
    }

    /// Set the scope used for the next generation.
    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.external_nullifier = scope.into();
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Persist the slot. Verification state is not written.
    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<(), SlotError> {
        let record = SlotRecord {
            group: self.group.as_ref().map(|g| SlotGroup {
                members: g.members.clone(),
            }),
            identity: self.identity.clone(),
            is_member: self.is_member,
            proof: self.controller.proof().cloned(),
            signal: self.signal.clone(),
            external_nullifier: self.external_nullifier.clone(),
        };
        let doc = serde_json::to_string(&record).map_err(SlotError::Serialization)?;
        kv.write(WALKTHROUGH_KEY, &doc)?;
        Ok(())
    }

    /// Load the slot from persistence. An absent document is a fresh
    /// slot.
    ///
    /// The group is rebuilt from its member list with a recomputed root.
    /// If membership is claimed, the slot reconciles; a repair discards
    /// any stored proof (the root it attested to is gone). Verification
    /// always restarts at `Unknown`.
    pub fn load(
        kv: &dyn KeyValueStore,
        backend: &dyn ProofBackend,
    ) -> Result<Self, SlotError> {
        let Some(doc) = kv.read(WALKTHROUGH_KEY)? else {
            return Ok(Self::new());
        };
        let record: SlotRecord =
            serde_json::from_str(&doc).map_err(SlotError::Serialization)?;

        let mut group = record.group.map(|sg| {
            let mut g = GroupRecord::new(
                "walkthrough",
                DEFAULT_TREE_DEPTH,
                backend.empty_root(DEFAULT_TREE_DEPTH),
            );
            g.root = backend.compute_root(g.depth, &sg.members);
            g.members = sg.members;
            g
        });

        let mut proof = record.proof;
        let mut is_member = record.is_member;

        if let Some(identity) = record.identity.as_ref() {
            if let Some(g) = group.take() {
                let outcome =
                    membership::reconcile(&identity.commitment, g, record.is_member, backend);
                if outcome.repaired {
                    // The repair changed the root; whatever the stored
                    // proof attested to, that set no longer exists.
                    if proof.take().is_some() {
                        tracing::warn!("stored proof discarded after membership repair");
                    }
                }
                is_member = outcome.is_member;
                group = Some(outcome.group);
            }
        }

        Ok(Self {
            group,
            identity: record.identity,
            material: None,
            is_member,
            signal: non_empty_or(record.signal, DEFAULT_SIGNAL),
            external_nullifier: non_empty_or(record.external_nullifier, DEFAULT_SCOPE),
            controller: ProofLifecycleController::restore(proof),
        })
    }

    /// Re-read persisted state, replacing the in-memory slot.
    pub fn resync(
        &mut self,
        kv: &dyn KeyValueStore,
        backend: &dyn ProofBackend,
    ) -> Result<(), SlotError> {
        *self = Self::load(kv, backend)?;
        Ok(())
    }

    /// Reset to defaults and remove the persisted document.
    pub fn clear(&mut self, kv: &dyn KeyValueStore) -> Result<(), SlotError> {
        kv.remove(WALKTHROUGH_KEY)?;
        *self = Self::new();
        Ok(())
    }

    // ── Views ────────────────────────────────────────────────────────

    /// The slot's group, if created.
    pub fn group(&self) -> Option<&GroupRecord> {
        self.group.as_ref()
    }

    /// The slot's identity record, if minted.
    pub fn identity(&self) -> Option<&IdentityRecord> {
        self.identity.as_ref()
    }

    /// Whether signing material is available (false after a reload).
    pub fn can_sign(&self) -> bool {
        self.material.is_some()
    }

    /// The membership intent flag.
    pub fn is_member(&self) -> bool {
        self.is_member
    }

    /// Whether the identity's commitment is actually in the group.
    pub fn membership_verified(&self) -> bool {
        match (&self.identity, &self.group) {
            (Some(identity), Some(group)) => {
                membership::verify_membership(&identity.commitment, group)
            }
            _ => false,
        }
    }

    /// Current signal.
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// Current scope.
    pub fn scope(&self) -> &str {
        &self.external_nullifier
    }

    /// The stored proof, if any.
    pub fn proof(&self) -> Option<&MembershipProof> {
        self.controller.proof()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ProofPhase {
        self.controller.phase()
    }

    /// Current verification tri-state.
    pub fn verdict(&self) -> Verification {
        self.controller.verdict()
    }
}

impl Default for Walkthrough {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
