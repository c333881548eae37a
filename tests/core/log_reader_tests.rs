use archon::core::adapters::{
    AdapterBundle, AdapterCallContext, DispatchResult, ExecAdapter, FilesystemAdapter,
    HandlerRegistry, MessagingAdapter, NetworkAdapter, SecretsAdapter, UiAdapter,
};
use archon::core::gate::gate;
use archon::core::log_reader::{detect_drift, read_log, DriftStatus};
use archon::core::proposal::{approve_proposal, propose, Actor, ActorKind, ApproveOptions, GovernanceContext, ProposalChange};
use archon::core::registries::{
    AckStore, CapabilityDescriptor, CapabilityRegistry, Confirmed, ModuleManifest, ModuleRegistry,
    ResourceConfig, ResourceConfigStore, RestrictionRegistry,
};
use archon::core::snapshot;
use archon::core::state_io::{MemoryStateIO, StateIO};
use archon::core::taxonomy::{CapabilityType, RiskTier};
use archon::core::time::{FixedClock, FixedIdGenerator};
use archon::core::validate::CapabilityInstance;
use async_trait::async_trait;
use std::collections::BTreeMap;

struct EchoAdapter;
#[async_trait]
impl FilesystemAdapter for EchoAdapter {
    async fn call(&self, _ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::Value::Null)
    }
}
#[async_trait]
impl NetworkAdapter for EchoAdapter {
    async fn call(&self, _ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::Value::Null)
    }
}
#[async_trait]
impl ExecAdapter for EchoAdapter {
    async fn call(&self, _ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::Value::Null)
    }
}
#[async_trait]
impl SecretsAdapter for EchoAdapter {
    async fn call(&self, _ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::Value::Null)
    }
}
#[async_trait]
impl MessagingAdapter for EchoAdapter {
    async fn call(&self, _ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::Value::Null)
    }
}
#[async_trait]
impl UiAdapter for EchoAdapter {
    async fn call(&self, _ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::Value::Null)
    }
}

fn bundle() -> AdapterBundle {
    AdapterBundle {
        filesystem: Box::new(EchoAdapter),
        network: Box::new(EchoAdapter),
        exec: Box::new(EchoAdapter),
        secrets: Box::new(EchoAdapter),
        messaging: Box::new(EchoAdapter),
        ui: Box::new(EchoAdapter),
    }
}

fn clock() -> FixedClock {
    FixedClock::from_rfc3339("2026-01-01T00:00:00Z")
}

fn action(path: &str) -> CapabilityInstance {
    CapabilityInstance {
        project_id: "p1".to_string(),
        module_id: "filesystem".to_string(),
        capability_id: "read".to_string(),
        capability_type_raw: "fs.read".to_string(),
        tier: RiskTier::T1,
        params: BTreeMap::from([("path".to_string(), serde_json::json!(path))]),
    }
}

fn human() -> Actor {
    Actor { kind: ActorKind::Human, id: "operator".to_string() }
}

fn agent() -> Actor {
    Actor { kind: ActorKind::Agent, id: "agent1".to_string() }
}

fn setup_fs_module(state: &MemoryStateIO) -> (ModuleRegistry, CapabilityRegistry) {
    let mut modules = ModuleRegistry::new();
    modules
        .register(ModuleManifest {
            module_id: "filesystem".to_string(),
            version: "1.0.0".to_string(),
            hash: "h".to_string(),
            capability_descriptors: vec![CapabilityDescriptor {
                capability_id: "read".to_string(),
                capability_type: CapabilityType::FsRead,
                tier: RiskTier::T1,
                params_schema: serde_json::json!({}),
                ack_required: false,
                default_enabled: false,
                hazards: vec![],
            }],
            registered_at: "2026-01-01T00:00:00Z".to_string(),
        })
        .unwrap();
    modules.enable("filesystem", Confirmed::attest(), state).unwrap();
    (modules, CapabilityRegistry::new())
}

#[tokio::test]
async fn real_decision_log_from_a_quiet_gate_sequence_drifts_none() {
    let state = MemoryStateIO::new();
    let clock = clock();
    let ids = FixedIdGenerator::new("evt");
    let snap = snapshot::build(
        &[ModuleManifest {
            module_id: "filesystem".to_string(),
            version: "1.0.0".to_string(),
            hash: "h".to_string(),
            capability_descriptors: vec![CapabilityDescriptor {
                capability_id: "read".to_string(),
                capability_type: CapabilityType::FsRead,
                tier: RiskTier::T1,
                params_schema: serde_json::json!({}),
                ack_required: false,
                default_enabled: false,
                hazards: vec![],
            }],
            registered_at: "2026-01-01T00:00:00Z".to_string(),
        }],
        &[CapabilityType::FsRead],
        &[],
        snapshot::compute_config_hash(),
        "p1",
        &clock,
        0,
        ResourceConfig::default(),
    );
    let rs_hash = snapshot::hash(&snap);
    let handlers = HandlerRegistry::new();

    for path in ["./a.md", "./b.md", "./c.md"] {
        gate(
            "agent1", action(path), &snap, &rs_hash, &handlers, &bundle(),
            &ResourceConfig::default(), &clock, &ids, &state,
        )
        .await
        .unwrap();
    }

    let raw = state.read_log_raw("logs/decisions.jsonl").unwrap();
    let result = read_log(&raw);
    assert_eq!(result.events.len(), 3);
    assert_eq!(result.stats.parse_errors, 0);
    assert_eq!(result.stats.duplicates, 0);

    let drift = detect_drift(&result);
    assert_eq!(drift.status, DriftStatus::None);
}

#[tokio::test]
async fn real_proposal_events_log_round_trips_through_the_reader() {
    let state = MemoryStateIO::new();
    let ids = FixedIdGenerator::new("p");
    let (mut modules, mut caps) = setup_fs_module(&state);

    let proposal = propose(
        ProposalChange::EnableCapability { capability_type: CapabilityType::FsRead },
        agent(),
        &modules,
        &caps,
        &clock(),
        &ids,
        &state,
    )
    .unwrap();

    let mut restrictions = RestrictionRegistry::new();
    let acks = AckStore::new();
    let rc_store = ResourceConfigStore::new();
    let mut ctx = GovernanceContext {
        module_registry: &mut modules,
        capability_registry: &mut caps,
        restriction_registry: &mut restrictions,
        ack_store: &acks,
        resource_config_store: &rc_store,
        archon_home: std::path::Path::new("."),
    };
    approve_proposal(
        &proposal.id,
        &ApproveOptions::default(),
        human(),
        &mut ctx,
        || "hash1".to_string(),
        &clock(),
        &ids,
        &state,
    )
    .unwrap();

    let raw = state.read_log_raw("logs/proposal-events.jsonl").unwrap();
    let result = read_log(&raw);
    assert_eq!(result.events.len(), 2);
    assert_eq!(result.stats.parse_errors, 0);

    let drift = detect_drift(&result);
    assert_eq!(drift.status, DriftStatus::None);
}
