//! # sigil-state — Consistency Machinery
//!
//! The components that keep a client-held membership set, an identity's
//! commitment, and a previously produced proof mutually coherent:
//!
//! - **[`membership`]**: detects and repairs divergence between the
//!   "member of group" flag (the record of user *intent*) and actual
//!   commitment containment (the record of *effect*). Repair only ever
//!   makes effect catch up to intent, never the reverse.
//!
//! - **[`proof`]**: the proof lifecycle state machine —
//!   `NoProof → Generating → Generated → Verifying → {Valid, Invalid}` —
//!   with a per-slot reentrancy guard and external invalidation. A proof
//!   is never reported valid unless it was verified against the exact
//!   public inputs it carries.
//!
//! - **[`slot`]**: the persisted single-slot walkthrough tying the two
//!   together across reloads. Verification state never survives a
//!   reload; a load-time repair that changes the root discards any
//!   stored proof.
//!
//! Everything here is polymorphic over `&dyn ProofBackend` — swapping
//! the cryptographic backend requires no change to any state machine.

pub mod membership;
pub mod proof;
pub mod slot;

// Re-export primary types.
pub use membership::{reconcile, verify_membership, Reconciliation};
pub use proof::{
    InvalidationReason, LifecycleError, ProofLifecycleController, ProofPhase, Verification,
};
pub use slot::{SlotError, Walkthrough, DEFAULT_SCOPE, DEFAULT_SIGNAL, WALKTHROUGH_KEY};
