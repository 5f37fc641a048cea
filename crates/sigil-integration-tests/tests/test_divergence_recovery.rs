//! Divergence and repair: the membership flag (intent) and the rebuilt
//! member list (effect) disagree after a reload, and reconciliation must
//! make effect catch up before any proof work happens.

use sigil_state::{reconcile, verify_membership, ProofPhase, Walkthrough, WALKTHROUGH_KEY};
use sigil_store::{EntityStore, KeyValueStore, MemoryStore};
use sigil_zkp::{BackendKind, ProofBackend};

#[test]
fn reconciled_entity_store_group_supports_proof_generation() {
    let backend = BackendKind::Sha256.backend();
    let mut store = EntityStore::open(Box::new(MemoryStore::new())).unwrap();
    let group_id = store.create_group("g", backend).unwrap();
    let (_, material) = store.create_identity("alice", backend).unwrap();

    // The flag said "member", but add_member never ran.
    let group = store.group(group_id).unwrap().clone();
    assert!(!verify_membership(&material.commitment, &group));

    let outcome = reconcile(&material.commitment, group, true, backend);
    assert!(outcome.repaired);
    store.replace_group(group_id, outcome.group).unwrap();

    // Effect caught up with intent, and the repaired group is settled:
    // proof generation goes through.
    let repaired = store.group(group_id).unwrap().clone();
    assert_eq!(
        repaired.root,
        backend.compute_root(repaired.depth, &repaired.members)
    );
    let mut slot = sigil_state::ProofLifecycleController::new();
    slot.generate(&material, &repaired, "Voto_A", "eleccion_presidente_2024", backend)
        .unwrap();
    assert!(slot.verify(backend).unwrap());
}

#[test]
fn slot_load_repairs_claimed_membership_before_any_proof_attempt() {
    let backend = BackendKind::Sha256.backend();
    let kv = MemoryStore::new();

    let mut slot = Walkthrough::new();
    slot.create_group(backend);
    slot.create_identity("w", backend).unwrap();
    slot.join_group(backend).unwrap();
    slot.save(&kv).unwrap();

    // Corrupt the persisted document: membership claimed, commitment
    // missing — the shape a half-completed earlier session leaves.
    let doc = kv.read(WALKTHROUGH_KEY).unwrap().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    value["group"]["members"] = serde_json::json!([]);
    assert_eq!(value["is_member"], serde_json::json!(true));
    kv.write(WALKTHROUGH_KEY, &value.to_string()).unwrap();

    let reloaded = Walkthrough::load(&kv, backend).unwrap();
    let group = reloaded.group().unwrap();
    let identity = reloaded.identity().unwrap();
    assert!(group.contains(&identity.commitment));
    assert_eq!(
        group.root,
        backend.compute_root(group.depth, &group.members)
    );
}

#[test]
fn repair_discards_a_proof_generated_against_the_old_set() {
    let backend = BackendKind::Sha256.backend();
    let kv = MemoryStore::new();

    let mut slot = Walkthrough::new();
    slot.create_group(backend);
    slot.create_identity("w", backend).unwrap();
    slot.join_group(backend).unwrap();
    slot.generate_proof(backend).unwrap();
    slot.save(&kv).unwrap();

    let doc = kv.read(WALKTHROUGH_KEY).unwrap().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    value["group"]["members"] = serde_json::json!([]);
    kv.write(WALKTHROUGH_KEY, &value.to_string()).unwrap();

    // The repair changes the root, so the stored proof no longer attests
    // to any existing set — it must not be shown at all.
    let reloaded = Walkthrough::load(&kv, backend).unwrap();
    assert_eq!(reloaded.phase(), ProofPhase::NoProof);
    assert!(reloaded.proof().is_none());
}

#[test]
fn unclaimed_containment_never_promotes_on_load() {
    let backend = BackendKind::Sha256.backend();
    let kv = MemoryStore::new();

    let mut slot = Walkthrough::new();
    slot.create_group(backend);
    slot.create_identity("w", backend).unwrap();
    slot.join_group(backend).unwrap();
    slot.save(&kv).unwrap();

    // Flip the flag off while the commitment stays in the list.
    let doc = kv.read(WALKTHROUGH_KEY).unwrap().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    value["is_member"] = serde_json::json!(false);
    kv.write(WALKTHROUGH_KEY, &value.to_string()).unwrap();

    let reloaded = Walkthrough::load(&kv, backend).unwrap();
    assert!(!reloaded.is_member());
    // Containment is untouched; only the intent flag governs.
    assert!(reloaded.membership_verified());
}
