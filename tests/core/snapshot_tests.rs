use archon::core::dsl::{compile_ast, parse_rule};
use archon::core::registries::{
    CapabilityDescriptor, CapabilityRegistry, ModuleManifest, ModuleRegistry, ResourceConfig,
};
use archon::core::snapshot::{build, compute_config_hash, empty, hash};
use archon::core::state_io::MemoryStateIO;
use archon::core::taxonomy::{CapabilityType, RiskTier};
use archon::core::time::FixedClock;

fn clock() -> FixedClock {
    FixedClock::from_rfc3339("2026-01-01T00:00:00Z")
}

fn filesystem_manifest() -> ModuleManifest {
    ModuleManifest {
        module_id: "filesystem".to_string(),
        version: "1.0.0".to_string(),
        hash: "builtin:filesystem".to_string(),
        capability_descriptors: vec![CapabilityDescriptor {
            capability_id: "fs.read".to_string(),
            capability_type: CapabilityType::FsRead,
            tier: RiskTier::T1,
            params_schema: serde_json::json!({}),
            ack_required: false,
            default_enabled: false,
            hazards: vec![],
        }],
        registered_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[test]
fn snapshot_assembled_from_live_registries_matches_rebuilt_snapshot() {
    let state = MemoryStateIO::new();
    let mut modules = ModuleRegistry::new();
    modules.register(filesystem_manifest()).unwrap();
    modules
        .enable(
            "filesystem",
            archon::core::registries::Confirmed::attest(),
            &state,
        )
        .unwrap();

    let mut capabilities = CapabilityRegistry::new();
    capabilities
        .enable_capability(CapabilityType::FsRead, &state)
        .unwrap();

    let rule = parse_rule(r#"allow fs.read where capability.params.path matches "./docs/**""#)
        .unwrap();
    let compiled = compile_ast(rule, "drr:1");

    let enabled_modules: Vec<ModuleManifest> =
        modules.manifests().filter(|m| modules.is_enabled(&m.module_id)).cloned().collect();

    let snap_a = build(
        &enabled_modules,
        &capabilities.list_enabled_capabilities(),
        &[compiled.clone()],
        compute_config_hash(),
        "proj-1",
        &clock(),
        0,
        ResourceConfig::default(),
    );
    let snap_b = build(
        &enabled_modules,
        &capabilities.list_enabled_capabilities(),
        &[compiled],
        compute_config_hash(),
        "proj-1",
        &clock(),
        0,
        ResourceConfig::default(),
    );
    assert_eq!(hash(&snap_a), hash(&snap_b));
    assert_eq!(snap_a.enabled_modules.len(), 1);
    assert_eq!(snap_a.drr_canonical.len(), 1);
}

#[test]
fn deny_by_default_empty_snapshot_hash_is_independent_of_project_module_state() {
    let state = MemoryStateIO::new();
    let mut modules = ModuleRegistry::new();
    modules.register(filesystem_manifest()).unwrap();
    modules.apply_persisted_state(&state).unwrap();

    assert!(!modules.is_enabled("filesystem"));
    let snap = empty("proj-1", &clock());
    assert!(snap.enabled_modules.is_empty());
    assert!(snap.enabled_capabilities.is_empty());
    assert_eq!(snap.config_hash, compute_config_hash());
}

#[test]
fn enabling_a_second_capability_changes_the_hash() {
    let state = MemoryStateIO::new();
    let mut capabilities = CapabilityRegistry::new();
    capabilities
        .enable_capability(CapabilityType::FsRead, &state)
        .unwrap();
    let before = build(
        &[], &capabilities.list_enabled_capabilities(), &[], compute_config_hash(),
        "p1", &clock(), 0, ResourceConfig::default(),
    );
    capabilities
        .enable_capability(CapabilityType::NetFetchHttp, &state)
        .unwrap();
    let after = build(
        &[], &capabilities.list_enabled_capabilities(), &[], compute_config_hash(),
        "p1", &clock(), 0, ResourceConfig::default(),
    );
    assert_ne!(hash(&before), hash(&after));
}
