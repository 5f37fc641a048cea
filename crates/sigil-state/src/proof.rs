//! # Proof Lifecycle State Machine
//!
//! One slot, one proof, one explicit phase:
//!
//! ```text
//! NoProof -> Generating -> Generated -> Verifying -> {Valid, Invalid}
//! ```
//!
//! Regeneration is always allowed from `Generated`, `Valid`, or
//! `Invalid` — it discards the prior proof and resets verification to
//! unknown. An external invalidation event (membership changed, root
//! changed, identity removed) forces the slot back to `NoProof` from any
//! phase.
//!
//! Verification authenticates the proof against the public inputs it
//! carries — never against a live group. If the group's root changed
//! after generation, the proof remains whatever it was: verification
//! answers "was this proof ever valid for the inputs it carries", not
//! "is this proof valid for my current group".

use thiserror::Error;

use sigil_core::{GroupRecord, MerkleRoot, ValidationError};
use sigil_zkp::{IdentityMaterial, MembershipProof, ProofBackend};

use crate::membership;

// ── Phases ───────────────────────────────────────────────────────────

/// The lifecycle phase of a proof slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProofPhase {
    /// No proof exists.
    NoProof,
    /// A generation call is outstanding.
    Generating,
    /// A proof exists; verification state unknown.
    Generated,
    /// A verification call is outstanding.
    Verifying,
    /// The stored proof verified true.
    Valid,
    /// The stored proof verified false (or verification itself failed).
    Invalid,
}

impl ProofPhase {
    /// The canonical string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoProof => "NO_PROOF",
            Self::Generating => "GENERATING",
            Self::Generated => "GENERATED",
            Self::Verifying => "VERIFYING",
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
        }
    }

    /// Whether a new generation may start from this phase.
    ///
    /// No wildcard: adding a phase forces a decision here instead of
    /// silently falling through.
    pub fn can_start_generation(&self) -> bool {
        match self {
            Self::NoProof | Self::Generated | Self::Valid | Self::Invalid => true,
            Self::Generating | Self::Verifying => false,
        }
    }

    /// Whether a proof is held in this phase.
    pub fn holds_proof(&self) -> bool {
        matches!(self, Self::Generated | Self::Verifying | Self::Valid | Self::Invalid)
    }
}

impl std::fmt::Display for ProofPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verification tri-state attached to a proof.
///
/// Never persisted: a proof's validity is not assumed to survive a
/// process restart, so every reload starts back at `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Not verified since generation or reload.
    Unknown,
    /// Last verification returned true.
    Valid,
    /// Last verification returned false or failed.
    Invalid,
}

/// Why a slot was externally invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The membership set the proof attests to changed.
    MembershipChanged,
    /// The group root changed (e.g. a reconciliation repair).
    RootChanged,
    /// The signing identity was removed.
    IdentityRemoved,
}

impl InvalidationReason {
    /// The canonical string name of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MembershipChanged => "MEMBERSHIP_CHANGED",
            Self::RootChanged => "ROOT_CHANGED",
            Self::IdentityRemoved => "IDENTITY_REMOVED",
        }
    }
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Proof lifecycle failures.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A generation call is already outstanding for this slot. Unrelated
    /// slots remain unblocked — this is a per-slot guard, not a global
    /// lock.
    #[error("a proof generation is already in flight for this slot")]
    GenerationInFlight,

    /// Rejected input (empty message or scope).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The identity's commitment is not in the target group. Hard
    /// precondition: no cryptographic work was performed and no partial
    /// proof state was created.
    #[error("not a member: commitment absent from group ({members} members, root {root})")]
    NotAMember {
        /// Size of the membership set that was checked.
        members: usize,
        /// The group root at the time of the check.
        root: MerkleRoot,
    },

    /// Verification was requested with no proof in the slot.
    #[error("nothing to verify: slot is in phase {phase}")]
    NothingToVerify {
        /// The phase the slot was in.
        phase: ProofPhase,
    },

    /// The cryptographic backend failed. The raw backend message is
    /// carried verbatim — diagnostic-rich failure is deliberate here.
    #[error("backend {backend} failed during {operation}: {detail}")]
    Backend {
        /// Name of the backend that failed.
        backend: &'static str,
        /// The operation that failed ("generate" or "verify").
        operation: &'static str,
        /// The backend's error message, verbatim.
        detail: String,
    },
}

// ── Controller ───────────────────────────────────────────────────────

/// Owner of one proof slot and its verification tri-state.
///
/// Polymorphic over the backend: both operations take
/// `&dyn ProofBackend`, so the slot may generate with one backend and
/// verify with another without any change here.
#[derive(Debug)]
pub struct ProofLifecycleController {
    phase: ProofPhase,
    proof: Option<MembershipProof>,
    in_flight: bool,
}

impl ProofLifecycleController {
    /// A fresh slot with no proof.
    pub fn new() -> Self {
        Self {
            phase: ProofPhase::NoProof,
            proof: None,
            in_flight: false,
        }
    }

    /// Rebuild a slot from a persisted proof, if any.
    ///
    /// Verification is always `Unknown` after a restore — validity never
    /// survives a reload.
    pub fn restore(proof: Option<MembershipProof>) -> Self {
        let phase = if proof.is_some() {
            ProofPhase::Generated
        } else {
            ProofPhase::NoProof
        };
        Self {
            phase,
            proof,
            in_flight: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ProofPhase {
        self.phase
    }

    /// The stored proof, if any.
    pub fn proof(&self) -> Option<&MembershipProof> {
        self.proof.as_ref()
    }

    /// The verification tri-state implied by the current phase.
    pub fn verdict(&self) -> Verification {
        match self.phase {
            ProofPhase::Valid => Verification::Valid,
            ProofPhase::Invalid => Verification::Invalid,
            _ => Verification::Unknown,
        }
    }

    /// Generate a proof for `material` against `group`, bound to
    /// `message` within `scope`.
    ///
    /// Preconditions, in order: no generation in flight; `message` and
    /// `scope` non-empty; the material's commitment is a member of
    /// `group` (checked via [`membership::verify_membership`], not
    /// re-derived). Any precondition failure leaves the slot exactly as
    /// it was.
    ///
    /// On success the resulting proof is recorded verbatim — the root it
    /// carries is the reference point for later validity re-checks — and
    /// the slot transitions to `Generated` with verification reset to
    /// unknown. On backend failure the slot returns to `NoProof` and the
    /// raw backend error surfaces verbatim.
    pub fn generate(
        &mut self,
        material: &IdentityMaterial,
        group: &GroupRecord,
        message: &str,
        scope: &str,
        backend: &dyn ProofBackend,
    ) -> Result<&MembershipProof, LifecycleError> {
        if self.in_flight || !self.phase.can_start_generation() {
            return Err(LifecycleError::GenerationInFlight);
        }
        if message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        if scope.trim().is_empty() {
            return Err(ValidationError::EmptyScope.into());
        }
        if !membership::verify_membership(&material.commitment, group) {
            return Err(LifecycleError::NotAMember {
                members: group.member_count(),
                root: group.root.clone(),
            });
        }

        // The prior proof is discarded on entry, not on success: once we
        // are Generating there is no proof to show.
        self.phase = ProofPhase::Generating;
        self.proof = None;
        self.in_flight = true;

        let result = backend.generate_proof(material, group, message, scope);
        self.in_flight = false;

        match result {
            Ok(proof) => {
                self.phase = ProofPhase::Generated;
                let proof = self.proof.insert(proof);
                tracing::info!(
                    backend = backend.name(),
                    root = %proof.merkle_tree_root,
                    scope = %proof.scope,
                    "proof generated"
                );
                Ok(proof)
            }
            Err(e) => {
                self.phase = ProofPhase::NoProof;
                Err(LifecycleError::Backend {
                    backend: backend.name(),
                    operation: "generate",
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Verify the stored proof against the public inputs it carries.
    ///
    /// `Ok(true)`/`Ok(false)` transition to `Valid`/`Invalid`. A backend
    /// failure (distinct from a clean false) transitions to `Invalid`
    /// AND surfaces the diagnostic — never silently swallowed, never a
    /// panic.
    pub fn verify(&mut self, backend: &dyn ProofBackend) -> Result<bool, LifecycleError> {
        let Some(proof) = self.proof.clone() else {
            return Err(LifecycleError::NothingToVerify { phase: self.phase });
        };

        self.phase = ProofPhase::Verifying;
        match backend.verify_proof(&proof) {
            Ok(valid) => {
                tracing::info!(backend = backend.name(), valid, "proof verified");
                self.phase = if valid {
                    ProofPhase::Valid
                } else {
                    ProofPhase::Invalid
                };
                Ok(valid)
            }
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "verification failed");
                self.phase = ProofPhase::Invalid;
                Err(LifecycleError::Backend {
                    backend: backend.name(),
                    operation: "verify",
                    detail: e.to_string(),
                })
            }
        }
    }

    /// External invalidation: membership changed, root changed, or the
    /// identity was removed. Forces `NoProof` from any phase and
    /// discards the proof.
    pub fn invalidate(&mut self, reason: InvalidationReason) {
        if self.phase != ProofPhase::NoProof {
            tracing::info!(reason = %reason, from = %self.phase, "proof invalidated");
        }
        self.phase = ProofPhase::NoProof;
        self.proof = None;
    }
}

impl Default for ProofLifecycleController {
    fn default() -> Self {
        Self::new()
    }
}
