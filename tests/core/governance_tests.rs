use archon::core::governance::{apply_disable_module, apply_enable_capability, EnableCapabilityOptions};
use archon::core::registries::{
    AckStore, CapabilityDescriptor, CapabilityRegistry, Confirmed, ModuleManifest, ModuleRegistry,
};
use archon::core::state_io::MemoryStateIO;
use archon::core::taxonomy::{build_expected_ack_phrase, typed_ack_required, CapabilityType, RiskTier};
use archon::core::time::{FixedClock, FixedIdGenerator};

fn clock() -> FixedClock {
    FixedClock::from_rfc3339("2026-01-01T00:00:00Z")
}

fn manifest(module_id: &str, types: &[CapabilityType]) -> ModuleManifest {
    ModuleManifest {
        module_id: module_id.to_string(),
        version: "1.0.0".to_string(),
        hash: "h".to_string(),
        capability_descriptors: types
            .iter()
            .map(|ty| CapabilityDescriptor {
                capability_id: ty.as_str().to_string(),
                capability_type: *ty,
                tier: ty.tier(),
                params_schema: serde_json::json!({}),
                ack_required: typed_ack_required(ty.tier()),
                default_enabled: false,
                hazards: vec![],
            })
            .collect(),
        registered_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[test]
fn t2_enables_without_a_typed_ack_event_but_still_advances_nothing() {
    let state = MemoryStateIO::new();
    let mut modules = ModuleRegistry::new();
    modules
        .register(manifest("network", &[CapabilityType::NetPostHttp]))
        .unwrap();
    modules.enable("network", Confirmed::attest(), &state).unwrap();
    let mut caps = CapabilityRegistry::new();
    let acks = AckStore::new();
    let ids = FixedIdGenerator::new("evt");

    assert_eq!(CapabilityType::NetPostHttp.tier(), RiskTier::T2);
    let result = apply_enable_capability(
        CapabilityType::NetPostHttp,
        &EnableCapabilityOptions::default(),
        &modules,
        &mut caps,
        &acks,
        &clock(),
        &ids,
        &state,
    )
    .unwrap();

    assert!(result.applied);
    assert_eq!(result.ack_event_id, None);
    assert!(result.hazard_event_ids.is_empty());
    assert_eq!(acks.ack_epoch(&state).unwrap(), 0);
}

#[test]
fn ack_event_can_be_patched_with_the_rs_hash_in_effect_after_commit() {
    let state = MemoryStateIO::new();
    let mut modules = ModuleRegistry::new();
    modules
        .register(manifest("filesystem", &[CapabilityType::FsDelete]))
        .unwrap();
    modules.enable("filesystem", Confirmed::attest(), &state).unwrap();
    let mut caps = CapabilityRegistry::new();
    let acks = AckStore::new();
    let ids = FixedIdGenerator::new("evt");

    let opts = EnableCapabilityOptions {
        typed_ack_phrase: Some(build_expected_ack_phrase(RiskTier::T3, CapabilityType::FsDelete)),
        hazard_confirmed_pairs: vec![],
    };
    let result = apply_enable_capability(
        CapabilityType::FsDelete, &opts, &modules, &mut caps, &acks, &clock(), &ids, &state,
    )
    .unwrap();
    let event_id = result.ack_event_id.expect("t3 capability records an ack event");

    assert!(acks.patch_rs_hash_after(&event_id, "rs-hash-after-commit", &state).unwrap());
    let logged = acks.list_acks(&state).unwrap();
    assert_eq!(logged[0].rs_hash_after, Some("rs-hash-after-commit".to_string()));

    // Second commit's patch attempt on the same id is a no-op (first patch wins).
    assert!(acks.patch_rs_hash_after(&event_id, "rs-hash-second-commit", &state).unwrap());
    let logged_again = acks.list_acks(&state).unwrap();
    assert_eq!(logged_again[0].rs_hash_after, Some("rs-hash-after-commit".to_string()));
}

#[test]
fn disabling_an_unregistered_module_fails_without_mutating_anything() {
    let state = MemoryStateIO::new();
    let mut modules = ModuleRegistry::new();
    let mut caps = CapabilityRegistry::new();

    let err = apply_disable_module(
        "ghost", &mut modules, &mut caps, Confirmed::attest(), &state,
    )
    .unwrap_err();
    assert!(matches!(err, archon::core::error::ArchonError::ModuleNotRegistered(_)));
}

#[test]
fn hazard_confirmation_accepted_regardless_of_pair_argument_order() {
    let state = MemoryStateIO::new();
    let mut modules = ModuleRegistry::new();
    modules
        .register(manifest(
            "risky",
            &[CapabilityType::SecretsUse, CapabilityType::ExecRun],
        ))
        .unwrap();
    modules.enable("risky", Confirmed::attest(), &state).unwrap();
    let mut caps = CapabilityRegistry::new();
    let acks = AckStore::new();
    let ids = FixedIdGenerator::new("evt");

    let enable_secrets = EnableCapabilityOptions {
        typed_ack_phrase: Some(build_expected_ack_phrase(RiskTier::T3, CapabilityType::SecretsUse)),
        hazard_confirmed_pairs: vec![],
    };
    apply_enable_capability(
        CapabilityType::SecretsUse, &enable_secrets, &modules, &mut caps, &acks, &clock(), &ids, &state,
    )
    .unwrap();

    // Confirmation supplied with the pair reversed relative to (ty, partner) still satisfies it.
    let enable_exec = EnableCapabilityOptions {
        typed_ack_phrase: Some(build_expected_ack_phrase(RiskTier::T3, CapabilityType::ExecRun)),
        hazard_confirmed_pairs: vec![(CapabilityType::SecretsUse, CapabilityType::ExecRun)],
    };
    let result = apply_enable_capability(
        CapabilityType::ExecRun, &enable_exec, &modules, &mut caps, &acks, &clock(), &ids, &state,
    )
    .unwrap();
    assert!(result.applied);
    assert_eq!(result.hazard_event_ids.len(), 1);
}

#[test]
fn ack_epoch_accumulates_across_sequential_enable_calls_on_distinct_capabilities() {
    let state = MemoryStateIO::new();
    let mut modules = ModuleRegistry::new();
    modules
        .register(manifest(
            "filesystem",
            &[CapabilityType::FsDelete, CapabilityType::SecretsRotate],
        ))
        .unwrap();
    modules.enable("filesystem", Confirmed::attest(), &state).unwrap();
    let mut caps = CapabilityRegistry::new();
    let acks = AckStore::new();
    let ids = FixedIdGenerator::new("evt");

    assert_eq!(acks.ack_epoch(&state).unwrap(), 0);

    let opts_a = EnableCapabilityOptions {
        typed_ack_phrase: Some(build_expected_ack_phrase(RiskTier::T3, CapabilityType::FsDelete)),
        hazard_confirmed_pairs: vec![],
    };
    let result_a = apply_enable_capability(
        CapabilityType::FsDelete, &opts_a, &modules, &mut caps, &acks, &clock(), &ids, &state,
    )
    .unwrap();
    assert_eq!(result_a.ack_epoch, 1);

    let opts_b = EnableCapabilityOptions {
        typed_ack_phrase: Some(build_expected_ack_phrase(RiskTier::T3, CapabilityType::SecretsRotate)),
        hazard_confirmed_pairs: vec![],
    };
    let result_b = apply_enable_capability(
        CapabilityType::SecretsRotate, &opts_b, &modules, &mut caps, &acks, &clock(), &ids, &state,
    )
    .unwrap();
    assert_eq!(result_b.ack_epoch, 2);
    assert_eq!(acks.ack_epoch(&state).unwrap(), 2);
}
