use archon::core::dsl::{compile_ast, parse_rule};
use archon::core::registries::{CapabilityDescriptor, FsRoot, ModuleManifest, Perm, ResourceConfig};
use archon::core::snapshot;
use archon::core::taxonomy::CapabilityType;
use archon::core::time::FixedClock;
use archon::core::validate::{evaluate, CapabilityInstance, Outcome};
use std::collections::BTreeMap;

fn clock() -> FixedClock {
    FixedClock::from_rfc3339("2026-01-01T00:00:00Z")
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, serde_json::Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), serde_json::json!(v))).collect()
}

fn action(module_id: &str, ty: CapabilityType, params: BTreeMap<String, serde_json::Value>) -> CapabilityInstance {
    CapabilityInstance {
        project_id: "p1".to_string(),
        module_id: module_id.to_string(),
        capability_id: "cap1".to_string(),
        capability_type_raw: ty.as_str().to_string(),
        tier: ty.tier(),
        params,
    }
}

fn manifest(module_id: &str, ty: CapabilityType) -> ModuleManifest {
    ModuleManifest {
        module_id: module_id.to_string(),
        version: "1.0.0".to_string(),
        hash: "h".to_string(),
        capability_descriptors: vec![CapabilityDescriptor {
            capability_id: "cap1".to_string(),
            capability_type: ty,
            tier: ty.tier(),
            params_schema: serde_json::json!({}),
            ack_required: false,
            default_enabled: false,
            hazards: vec![],
        }],
        registered_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[test]
fn capability_enabled_but_module_missing_from_snapshot_is_denied() {
    let snap = snapshot::build(
        &[],
        &[CapabilityType::FsRead],
        &[],
        snapshot::compute_config_hash(),
        "p1",
        &clock(),
        0,
        ResourceConfig::default(),
    );
    let act = action("filesystem", CapabilityType::FsRead, params(&[("path", "./x")]));
    assert_eq!(evaluate(&act, &snap).outcome, Outcome::Deny);
}

#[test]
fn unparseable_capability_type_string_is_denied_not_a_panic() {
    let snap = snapshot::empty("p1", &clock());
    let mut act = action("filesystem", CapabilityType::FsRead, params(&[]));
    act.capability_type_raw = "fs.teleport".to_string();
    let result = evaluate(&act, &snap);
    assert_eq!(result.outcome, Outcome::Deny);
}

#[test]
fn exec_without_cwd_root_configured_is_denied_but_with_workspace_root_is_permitted() {
    let m = manifest("exec", CapabilityType::ExecRunSandboxed);
    let no_roots = snapshot::build(
        &[m.clone()],
        &[CapabilityType::ExecRunSandboxed],
        &[],
        snapshot::compute_config_hash(),
        "p1",
        &clock(),
        0,
        ResourceConfig::default(),
    );
    let act = action("exec", CapabilityType::ExecRunSandboxed, params(&[]));
    assert_eq!(evaluate(&act, &no_roots).outcome, Outcome::Permit);

    let mut cfg = ResourceConfig::default();
    cfg.fs_roots.push(FsRoot {
        id: "other".to_string(),
        path: "/other".to_string(),
        perm: Perm::Rw,
    });
    let missing_workspace = snapshot::build(
        &[m.clone()],
        &[CapabilityType::ExecRunSandboxed],
        &[],
        snapshot::compute_config_hash(),
        "p1",
        &clock(),
        0,
        cfg,
    );
    assert_eq!(evaluate(&act, &missing_workspace).outcome, Outcome::Deny);

    let mut cfg_ws = ResourceConfig::default();
    cfg_ws.fs_roots.push(FsRoot {
        id: "workspace".to_string(),
        path: "/work".to_string(),
        perm: Perm::Rw,
    });
    let with_workspace = snapshot::build(
        &[m],
        &[CapabilityType::ExecRunSandboxed],
        &[],
        snapshot::compute_config_hash(),
        "p1",
        &clock(),
        0,
        cfg_ws,
    );
    assert_eq!(evaluate(&act, &with_workspace).outcome, Outcome::Permit);
}

#[test]
fn conjunctive_conditions_require_every_condition_to_match() {
    let m = manifest("filesystem", CapabilityType::FsWrite);
    let mut cfg = ResourceConfig::default();
    cfg.fs_roots.push(FsRoot {
        id: "workspace".to_string(),
        path: "/work".to_string(),
        perm: Perm::Rw,
    });
    let ast = parse_rule(
        r#"deny fs.write where capability.params.path matches "/work/secrets/**" and capability.params.path matches "*.env""#,
    )
    .unwrap();
    let drr = compile_ast(ast, "drr:1");
    let snap = snapshot::build(
        &[m],
        &[CapabilityType::FsWrite],
        &[drr],
        snapshot::compute_config_hash(),
        "p1",
        &clock(),
        0,
        cfg,
    );

    let both_match = action(
        "filesystem",
        CapabilityType::FsWrite,
        params(&[("path", "/work/secrets/db.env")]),
    );
    assert_eq!(evaluate(&both_match, &snap).outcome, Outcome::Deny);

    let only_one_matches = action(
        "filesystem",
        CapabilityType::FsWrite,
        params(&[("path", "/work/secrets/notes.txt")]),
    );
    assert_eq!(evaluate(&only_one_matches, &snap).outcome, Outcome::Permit);
}

#[test]
fn net_allowlist_empty_denies_even_when_capability_enabled() {
    let m = manifest("network", CapabilityType::NetFetchHttp);
    let snap = snapshot::build(
        &[m],
        &[CapabilityType::NetFetchHttp],
        &[],
        snapshot::compute_config_hash(),
        "p1",
        &clock(),
        0,
        ResourceConfig::default(),
    );
    let act = action(
        "network",
        CapabilityType::NetFetchHttp,
        params(&[("url", "https://api.example.com"), ("host", "api.example.com")]),
    );
    assert_eq!(evaluate(&act, &snap).outcome, Outcome::Deny);
}
