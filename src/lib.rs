//! Archon: a deterministic coordination kernel for AI-agent capability
//! governance.
//!
//! Archon decides, for every action an agent proposes, whether it is
//! permitted against an operator-authored policy — then durably logs the
//! decision before anything dispatches. The kernel itself never performs an
//! action; it only decides and records.
//!
//! # Architecture
//!
//! - **`core::taxonomy`**: the closed nineteen-type capability taxonomy,
//!   risk tiers, and the hazard matrix.
//! - **`core::dsl`**: the non-Turing-complete restriction DSL.
//! - **`core::registries`**: the five stateful stores (module, capability,
//!   restriction, ack, resource-config).
//! - **`core::snapshot`**: assembles the effective policy into one
//!   canonical, content-addressed `RuleSnapshot`.
//! - **`core::validate`**: the pure `(action, snapshot) -> decision`
//!   evaluation engine.
//! - **`core::gate`**: sequences decide, durably log, then (only on permit)
//!   dispatch.
//! - **`core::governance`** / **`core::proposal`**: the atomic commit path
//!   and the pending/applied/rejected/failed proposal queue sitting in
//!   front of it.
//! - **`core::log_reader`**: JSONL log parsing and drift detection.
//! - **`core::secrets`**: the AEAD-sealed secret envelope.
//!
//! `cli` holds the clap command surface; this module's [`run`] wires parsed
//! commands to the core subsystems above.

pub mod cli;
pub mod core;

use crate::cli::{
    Cli, Command, DisableTarget, EnableTarget, LogArgs, ProjectAction, ProposalsAction,
    ProposeAction, RestrictAction,
};
use crate::core::adapters::{
    AdapterBundle, AdapterCallContext, AdapterFamily, DispatchResult, ExecAdapter,
    FilesystemAdapter, HandlerRegistry, MessagingAdapter, NetworkAdapter, SecretsAdapter,
    UiAdapter,
};
use crate::core::dsl::{parse_rule, Condition, Effect, Op, StructuredRestrictionRule};
use crate::core::error::ArchonError;
use crate::core::gate::gate;
use crate::core::governance::{apply_disable_module, apply_enable_capability, EnableCapabilityOptions};
use crate::core::log_reader::{detect_drift, read_log, DriftStatus};
use crate::core::project_store::{resolve_archon_home, ProjectStore};
use crate::core::proposal::{
    self, Actor, ActorKind, ApproveOptions, GovernanceContext, ProposalChange, ProposalStatus,
};
use crate::core::registries::{
    AckStore, CapabilityDescriptor, CapabilityRegistry, Confirmed, ModuleManifest, ModuleRegistry,
    ResourceConfigStore, RestrictionRegistry,
};
use crate::core::snapshot::{self, RuleSnapshot};
use crate::core::state_io::StateIO;
use crate::core::taxonomy::{typed_ack_required, CapabilityType, ALL_CAPABILITY_TYPES};
use crate::core::time::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::core::validate::{CapabilityInstance, Outcome};
use async_trait::async_trait;
use clap::Parser;
use colored::Colorize;
use std::collections::{BTreeMap, HashMap};

/// Which built-in module a capability type belongs to, and which adapter
/// family dispatches it. No concrete module ships with the kernel (spec
/// §1) — these six stand in for "a module that declares every type in its
/// family," enough for `status`/`enable`/`demo` to be meaningful without an
/// external module registering itself first.
fn family_of(ty: CapabilityType) -> (&'static str, AdapterFamily) {
    if ty.is_fs() {
        ("filesystem", AdapterFamily::Filesystem)
    } else if ty.is_net() {
        ("network", AdapterFamily::Network)
    } else if ty.is_exec() {
        ("exec", AdapterFamily::Exec)
    } else if ty.as_str().starts_with("secrets.") {
        ("secrets", AdapterFamily::Secrets)
    } else if ty.as_str().starts_with("messaging.") {
        ("messaging", AdapterFamily::Messaging)
    } else {
        ("ui", AdapterFamily::Ui)
    }
}

/// One manifest per adapter family, declaring every capability type in it.
fn builtin_manifests(clock: &dyn Clock) -> Vec<ModuleManifest> {
    let mut by_module: HashMap<&'static str, Vec<CapabilityDescriptor>> = HashMap::new();
    for ty in ALL_CAPABILITY_TYPES {
        let (module_id, _) = family_of(ty);
        by_module.entry(module_id).or_default().push(CapabilityDescriptor {
            capability_id: ty.as_str().to_string(),
            capability_type: ty,
            tier: ty.tier(),
            params_schema: serde_json::json!({}),
            ack_required: typed_ack_required(ty.tier()),
            default_enabled: false,
            hazards: vec![],
        });
    }
    let registered_at = clock.now_iso8601();
    let mut modules: Vec<ModuleManifest> = by_module
        .into_iter()
        .map(|(module_id, mut descriptors)| {
            descriptors.sort_by(|a, b| a.capability_id.cmp(&b.capability_id));
            ModuleManifest {
                module_id: module_id.to_string(),
                version: "1.0.0".to_string(),
                hash: format!("builtin:{module_id}"),
                capability_descriptors: descriptors,
                registered_at: registered_at.clone(),
            }
        })
        .collect();
    modules.sort_by(|a, b| a.module_id.cmp(&b.module_id));
    modules
}

fn parse_capability_type(raw: &str) -> Result<CapabilityType, ArchonError> {
    CapabilityType::parse(raw).ok_or_else(|| ArchonError::TaxonomyUnknown(raw.to_string()))
}

fn parse_effect(raw: &str) -> Result<Effect, ArchonError> {
    match raw {
        "allow" => Ok(Effect::Allow),
        "deny" => Ok(Effect::Deny),
        other => Err(ArchonError::DslParse {
            line: 1,
            column: 1,
            message: format!("effect must be 'allow' or 'deny', got '{other}'"),
        }),
    }
}

fn parse_field_glob(raw: &str) -> Result<Condition, ArchonError> {
    let (field, value) = raw.split_once('=').ok_or_else(|| ArchonError::DslParse {
        line: 1,
        column: 1,
        message: format!("condition '{raw}' is not of the form field=glob"),
    })?;
    Ok(Condition {
        field: format!("{}{field}", Condition::FIELD_PREFIX),
        op: Op::Matches,
        value: value.to_string(),
    })
}

fn parse_proposal_status(raw: &str) -> Result<ProposalStatus, ArchonError> {
    match raw {
        "pending" => Ok(ProposalStatus::Pending),
        "applied" => Ok(ProposalStatus::Applied),
        "rejected" => Ok(ProposalStatus::Rejected),
        "failed" => Ok(ProposalStatus::Failed),
        other => Err(ArchonError::NotFound(format!("unknown proposal status '{other}'"))),
    }
}

fn print_ok(cli: &Cli, message: &str) {
    if cli.json {
        println!("{}", serde_json::json!({"ok": true, "message": message}));
    } else {
        println!("{} {}", "ok".green(), message);
    }
}

/// Rebuild the effective `RuleSnapshot` for `project_id` straight from
/// persisted state. Independent of any live, possibly-mutably-borrowed
/// registry instance — this is what lets `approve_proposal`'s
/// `build_snapshot_hash` closure run without aliasing a [`GovernanceContext`]
/// that already holds `&mut` references into the same registries.
fn current_snapshot(
    state: &dyn StateIO,
    all_manifests: &[ModuleManifest],
    project_id: &str,
    clock: &dyn Clock,
) -> Result<RuleSnapshot, ArchonError> {
    let mut modules = ModuleRegistry::new();
    for m in all_manifests.iter().cloned() {
        modules.register(m)?;
    }
    modules.apply_persisted_state(state)?;
    let mut capabilities = CapabilityRegistry::new();
    capabilities.apply_persisted_state(state)?;
    let mut restrictions = RestrictionRegistry::new();
    restrictions.apply_persisted_state(state)?;
    let ack_store = AckStore::new();
    let resource_config_store = ResourceConfigStore::new();

    let enabled_manifests: Vec<ModuleManifest> = modules
        .manifests()
        .filter(|m| modules.is_enabled(&m.module_id))
        .cloned()
        .collect();
    let enabled_capabilities = capabilities.list_enabled_capabilities();
    let compiled_drrs = restrictions.compile_all();
    let ack_epoch = ack_store.ack_epoch(state)?;
    let resource_config = resource_config_store.load(state)?;
    let config_hash = snapshot::compute_config_hash();

    Ok(snapshot::build(
        &enabled_manifests,
        &enabled_capabilities,
        &compiled_drrs,
        config_hash,
        project_id.to_string(),
        clock,
        ack_epoch,
        resource_config,
    ))
}

/// A trivial stand-in adapter bundle for `demo`: no concrete adapter ships
/// with the kernel (spec §1), so the demo path echoes back what it would
/// have dispatched rather than actually touching a filesystem or network.
struct DemoAdapter;

#[async_trait]
impl FilesystemAdapter for DemoAdapter {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::json!({"family": "filesystem", "capability": ctx.capability_instance.capability_id}))
    }
}
#[async_trait]
impl NetworkAdapter for DemoAdapter {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::json!({"family": "network", "capability": ctx.capability_instance.capability_id}))
    }
}
#[async_trait]
impl ExecAdapter for DemoAdapter {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::json!({"family": "exec", "capability": ctx.capability_instance.capability_id}))
    }
}
#[async_trait]
impl SecretsAdapter for DemoAdapter {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::json!({"family": "secrets", "capability": ctx.capability_instance.capability_id}))
    }
}
#[async_trait]
impl MessagingAdapter for DemoAdapter {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::json!({"family": "messaging", "capability": ctx.capability_instance.capability_id}))
    }
}
#[async_trait]
impl UiAdapter for DemoAdapter {
    async fn call(&self, ctx: &AdapterCallContext) -> DispatchResult {
        DispatchResult::Success(serde_json::json!({"family": "ui", "capability": ctx.capability_instance.capability_id}))
    }
}

fn demo_bundle() -> AdapterBundle {
    AdapterBundle {
        filesystem: Box::new(DemoAdapter),
        network: Box::new(DemoAdapter),
        exec: Box::new(DemoAdapter),
        secrets: Box::new(DemoAdapter),
        messaging: Box::new(DemoAdapter),
        ui: Box::new(DemoAdapter),
    }
}

fn cmd_status(
    cli: &Cli,
    project_id: &str,
    state: &dyn StateIO,
    all_manifests: &[ModuleManifest],
    clock: &dyn Clock,
) -> Result<(), ArchonError> {
    let snap = current_snapshot(state, all_manifests, project_id, clock)?;
    let rs_hash = snapshot::hash(&snap);
    if cli.json {
        let value = serde_json::json!({
            "projectId": snap.project_id,
            "engineVersion": snap.engine_version,
            "enabledModules": snap.enabled_modules.iter().map(|m| m.module_id.as_str()).collect::<Vec<_>>(),
            "enabledCapabilities": snap.enabled_capabilities.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            "restrictionCount": snap.drr_canonical.len(),
            "ackEpoch": snap.ack_epoch,
            "rsHash": rs_hash,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("project: {}", snap.project_id);
        println!("engine: {}", snap.engine_version);
        println!(
            "modules enabled: {}",
            snap.enabled_modules.iter().map(|m| m.module_id.as_str()).collect::<Vec<_>>().join(", ")
        );
        println!(
            "capabilities enabled: {}",
            snap.enabled_capabilities.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
        );
        println!("restrictions: {}", snap.drr_canonical.len());
        println!("ack epoch: {}", snap.ack_epoch);
        println!("rs_hash: {}", rs_hash.dimmed());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_enable(
    cli: &Cli,
    target: EnableTarget,
    module_registry: &mut ModuleRegistry,
    capability_registry: &mut CapabilityRegistry,
    ack_store: &AckStore,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<(), ArchonError> {
    match target {
        EnableTarget::Module { module_id, confirm } => {
            if !confirm {
                return Err(ArchonError::AuthorityInsufficient(
                    "enabling a module requires --confirm".to_string(),
                ));
            }
            module_registry.enable(&module_id, Confirmed::attest(), state)?;
            print_ok(cli, &format!("module '{module_id}' enabled"));
        }
        EnableTarget::Capability { capability_type, ack_phrase, confirm_hazard_with } => {
            let ty = parse_capability_type(&capability_type)?;
            let mut hazard_confirmed_pairs = Vec::new();
            for partner in &confirm_hazard_with {
                hazard_confirmed_pairs.push((ty, parse_capability_type(partner)?));
            }
            let opts = EnableCapabilityOptions {
                typed_ack_phrase: ack_phrase,
                hazard_confirmed_pairs,
            };
            let result = apply_enable_capability(
                ty,
                &opts,
                module_registry,
                capability_registry,
                ack_store,
                clock,
                ids,
                state,
            )?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"applied": result.applied, "ackEpoch": result.ack_epoch})
                );
            } else {
                print_ok(cli, &format!("capability '{ty}' enabled (ack epoch {})", result.ack_epoch));
            }
        }
    }
    Ok(())
}

fn cmd_disable(
    cli: &Cli,
    target: DisableTarget,
    module_registry: &mut ModuleRegistry,
    capability_registry: &mut CapabilityRegistry,
    state: &dyn StateIO,
) -> Result<(), ArchonError> {
    match target {
        DisableTarget::Module { module_id, confirm } => {
            if !confirm {
                return Err(ArchonError::AuthorityInsufficient(
                    "disabling a module requires --confirm".to_string(),
                ));
            }
            let cascaded = apply_disable_module(
                &module_id,
                module_registry,
                capability_registry,
                Confirmed::attest(),
                state,
            )?;
            let cascaded_str = cascaded.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ");
            print_ok(cli, &format!("module '{module_id}' disabled (cascaded: {cascaded_str})"));
        }
        DisableTarget::Capability { capability_type } => {
            let ty = parse_capability_type(&capability_type)?;
            capability_registry.disable_capability(ty, state)?;
            print_ok(cli, &format!("capability '{ty}' disabled"));
        }
    }
    Ok(())
}

fn cmd_restrict(
    cli: &Cli,
    action: RestrictAction,
    restriction_registry: &mut RestrictionRegistry,
    state: &dyn StateIO,
) -> Result<(), ArchonError> {
    match action {
        RestrictAction::Add { effect, capability_type, conditions } => {
            let effect = parse_effect(&effect)?;
            let capability_type = parse_capability_type(&capability_type)?;
            let conditions = conditions
                .iter()
                .map(|c| parse_field_glob(c))
                .collect::<Result<Vec<_>, _>>()?;
            let rule = StructuredRestrictionRule { capability_type, effect, conditions };
            let id = restriction_registry.add(rule, state)?;
            print_ok(cli, &format!("rule '{id}' added"));
        }
        RestrictAction::AddDsl { source } => {
            let ast = parse_rule(&source)?;
            let rule: StructuredRestrictionRule = ast.into();
            let id = restriction_registry.add(rule, state)?;
            print_ok(cli, &format!("rule '{id}' added"));
        }
        RestrictAction::List => {
            let rules = restriction_registry.list();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(rules)?);
            } else {
                for r in rules {
                    println!(
                        "{} {} {} ({} condition(s))",
                        r.id,
                        r.rule.effect.as_str(),
                        r.rule.capability_type,
                        r.rule.conditions.len()
                    );
                }
            }
        }
        RestrictAction::Clear => {
            restriction_registry.clear(state)?;
            print_ok(cli, "all restriction rules cleared");
        }
    }
    Ok(())
}

fn cmd_rules(
    cli: &Cli,
    project_id: &str,
    state: &dyn StateIO,
    all_manifests: &[ModuleManifest],
    clock: &dyn Clock,
) -> Result<(), ArchonError> {
    let snap = current_snapshot(state, all_manifests, project_id, clock)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snap.drr_canonical)?);
    } else {
        for drr in &snap.drr_canonical {
            println!(
                "{} {} {} ({} condition(s)) ir={}",
                drr.id,
                drr.effect.as_str(),
                drr.capability_type,
                drr.conditions.len(),
                drr.ir_hash
            );
        }
    }
    Ok(())
}

fn cmd_log(cli: &Cli, args: &LogArgs, state: &dyn StateIO) -> Result<(), ArchonError> {
    let log_name = match args.source.as_str() {
        "proposals" => "logs/proposal-events.jsonl",
        _ => "logs/decisions.jsonl",
    };
    let raw = state.read_log_raw(log_name)?;
    let result = read_log(&raw);
    let drift = detect_drift(&result);
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "events": result.events,
                "stats": result.stats,
                "drift": drift,
            }))?
        );
    } else {
        println!("events: {}", result.events.len());
        println!("parse_errors: {}", result.stats.parse_errors);
        println!("duplicates: {}", result.stats.duplicates);
        println!("out_of_order: {}", result.stats.out_of_order);
        let status_label = match drift.status {
            DriftStatus::None => "none".green(),
            DriftStatus::Unknown => "unknown".yellow(),
            DriftStatus::Conflict => "conflict".red(),
        };
        println!("drift: {status_label}");
        for reason in &drift.reasons {
            println!("  - {reason}");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_demo(
    cli: &Cli,
    project_id: &str,
    capability_type: &str,
    path: &str,
    state: &dyn StateIO,
    all_manifests: &[ModuleManifest],
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
) -> Result<(), ArchonError> {
    let ty = parse_capability_type(capability_type)?;
    let (module_id, family) = family_of(ty);

    let snap = current_snapshot(state, all_manifests, project_id, clock)?;
    let rs_hash = snapshot::hash(&snap);

    let mut handlers = HandlerRegistry::new();
    handlers.register(module_id, ty.as_str(), family);

    let mut params = BTreeMap::new();
    if ty.is_net() {
        params.insert("url".to_string(), serde_json::json!(path));
    } else {
        params.insert("path".to_string(), serde_json::json!(path));
    }

    let action = CapabilityInstance {
        project_id: project_id.to_string(),
        module_id: module_id.to_string(),
        capability_id: ty.as_str().to_string(),
        capability_type_raw: ty.as_str().to_string(),
        tier: ty.tier(),
        params,
    };

    let adapters = demo_bundle();
    let result = gate(
        "demo-agent",
        action,
        &snap,
        &rs_hash,
        &handlers,
        &adapters,
        &snap.resource_config,
        clock,
        ids,
        state,
    )
    .await?;

    if cli.json {
        let dispatch = match &result.result {
            Some(DispatchResult::Success(v)) => serde_json::json!({"success": v}),
            Some(DispatchResult::Failed(e)) => serde_json::json!({"failed": e}),
            None => serde_json::Value::Null,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "outcome": result.outcome,
                "eventId": result.event_id,
                "dispatch": dispatch,
            }))?
        );
    } else {
        let label = match result.outcome.outcome {
            Outcome::Permit => "permit".green(),
            Outcome::Deny => "deny".red(),
            Outcome::Escalate => "escalate".yellow(),
        };
        println!("decision: {label} (event {})", result.event_id);
        if !result.outcome.triggered_rules.is_empty() {
            println!("triggered: {}", result.outcome.triggered_rules.join(", "));
        }
        match &result.result {
            Some(DispatchResult::Success(v)) => println!("dispatched: {v}"),
            Some(DispatchResult::Failed(e)) => println!("dispatch failed: {e}"),
            None => {}
        }
    }
    Ok(())
}

fn cmd_propose(
    cli: &Cli,
    action: ProposeAction,
    module_registry: &ModuleRegistry,
    capability_registry: &CapabilityRegistry,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<(), ArchonError> {
    let change = match action {
        ProposeAction::Enable { capability_type } => ProposalChange::EnableCapability {
            capability_type: parse_capability_type(&capability_type)?,
        },
        ProposeAction::Disable { capability_type } => ProposalChange::DisableCapability {
            capability_type: parse_capability_type(&capability_type)?,
        },
        ProposeAction::SetRestrictions { rules } => {
            let parsed = rules
                .iter()
                .map(|s| parse_rule(s).map(StructuredRestrictionRule::from))
                .collect::<Result<Vec<_>, _>>()?;
            ProposalChange::SetRestrictions { rules: parsed }
        }
    };
    let actor = Actor { kind: ActorKind::Cli, id: "cli".to_string() };
    let created = proposal::propose(change, actor, module_registry, capability_registry, clock, ids, state)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        print_ok(cli, &format!("proposal '{}' created: {}", created.id, created.preview.change_summary));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_proposals(
    cli: &Cli,
    action: ProposalsAction,
    module_registry: &mut ModuleRegistry,
    capability_registry: &mut CapabilityRegistry,
    restriction_registry: &mut RestrictionRegistry,
    ack_store: &AckStore,
    resource_config_store: &ResourceConfigStore,
    all_manifests: &[ModuleManifest],
    project_id: &str,
    archon_home: &std::path::Path,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<(), ArchonError> {
    match action {
        ProposalsAction::List { status } => {
            let status = status.as_deref().map(parse_proposal_status).transpose()?;
            let proposals = proposal::list_proposals(status, state)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&proposals)?);
            } else {
                for p in &proposals {
                    println!("{} [{:?}] {}", p.id, p.status, p.change_summary);
                }
            }
        }
        ProposalsAction::Show { id } => {
            let found = proposal::get_proposal(&id, state)?;
            match found {
                Some(p) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&p)?);
                    } else {
                        println!("{} [{:?}]: {}", p.id, p.status, p.preview.change_summary);
                    }
                }
                None => return Err(ArchonError::NotFound(format!("proposal '{id}'"))),
            }
        }
        ProposalsAction::Approve { id, ack_phrase, confirm_hazard_with, secret_value, passphrase } => {
            let existing = proposal::get_proposal(&id, state)?;
            let mut hazard_confirmed_pairs = Vec::new();
            if let Some(ProposalChange::EnableCapability { capability_type }) =
                existing.as_ref().map(|p| p.change.clone())
            {
                for partner in &confirm_hazard_with {
                    hazard_confirmed_pairs.push((capability_type, parse_capability_type(partner)?));
                }
            }
            let opts = ApproveOptions {
                typed_ack_phrase: ack_phrase,
                hazard_confirmed_pairs,
                secret_value,
                passphrase,
            };
            let mut ctx = GovernanceContext {
                module_registry,
                capability_registry,
                restriction_registry,
                ack_store,
                resource_config_store,
                archon_home,
            };
            let approver = Actor { kind: ActorKind::Cli, id: "cli".to_string() };
            let build_hash = || {
                current_snapshot(state, all_manifests, project_id, clock)
                    .map(|snap| snapshot::hash(&snap))
                    .unwrap_or_default()
            };
            let result = proposal::approve_proposal(&id, &opts, approver, &mut ctx, build_hash, clock, ids, state)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.applied {
                println!("{} proposal '{id}' applied (ack epoch {})", "ok".green(), result.ack_epoch);
            } else {
                println!(
                    "{} proposal '{id}' not applied: {}",
                    "fail".red(),
                    result.error.unwrap_or_default()
                );
            }
        }
        ProposalsAction::Reject { id, reason } => {
            let rejector = Actor { kind: ActorKind::Cli, id: "cli".to_string() };
            let rejected = proposal::reject_proposal(&id, rejector, reason, clock, ids, state)?;
            match rejected {
                Some(p) => print_ok(cli, &format!("proposal '{}' rejected", p.id)),
                None => return Err(ArchonError::NotFound(format!("proposal '{id}'"))),
            }
        }
    }
    Ok(())
}

fn cmd_project(
    cli: &Cli,
    action: ProjectAction,
    project_store: &ProjectStore,
    clock: &dyn Clock,
) -> Result<(), ArchonError> {
    match action {
        ProjectAction::Create { id } => {
            let record = project_store.create_project(&id, clock)?;
            print_ok(cli, &format!("project '{}' created", record.id));
        }
        ProjectAction::List => {
            let projects = project_store.list_projects()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                for p in &projects {
                    println!("{} (created {})", p.id, p.created_at);
                }
            }
        }
        ProjectAction::Open { id } => {
            project_store.open_project(&id)?;
            print_ok(cli, &format!("project '{id}' is now active"));
        }
        ProjectAction::Current => {
            let current = project_store.current_project_id()?;
            if cli.json {
                println!("{}", serde_json::json!({"projectId": current}));
            } else {
                println!("{}", current.unwrap_or_else(|| "(none)".to_string()));
            }
        }
    }
    Ok(())
}

/// Parse argv, resolve the active project, rehydrate its registries from
/// persisted state, and dispatch the requested command. The only async
/// boundary below `run` is the one `gate()` crosses for `demo`.
pub async fn run() -> Result<(), ArchonError> {
    let cli = Cli::parse();
    let clock = SystemClock;
    let ids = UlidGenerator;

    let archon_home = resolve_archon_home()?;
    let project_store = ProjectStore::new(archon_home);
    project_store.ensure_initialized(&clock)?;

    let project_id = match &cli.project {
        Some(id) => id.clone(),
        None => project_store
            .current_project_id()?
            .ok_or_else(|| ArchonError::NotFound("no active project".to_string()))?,
    };
    let state = project_store.state_io_for(&project_id)?;

    let all_manifests = builtin_manifests(&clock);
    let mut module_registry = ModuleRegistry::new();
    for m in all_manifests.iter().cloned() {
        module_registry.register(m)?;
    }
    module_registry.apply_persisted_state(&state)?;
    let mut capability_registry = CapabilityRegistry::new();
    capability_registry.apply_persisted_state(&state)?;
    let mut restriction_registry = RestrictionRegistry::new();
    restriction_registry.apply_persisted_state(&state)?;
    let ack_store = AckStore::new();
    let resource_config_store = ResourceConfigStore::new();

    match cli.command.clone() {
        Command::Status => cmd_status(&cli, &project_id, &state, &all_manifests, &clock)?,
        Command::Enable { target } => cmd_enable(
            &cli,
            target,
            &mut module_registry,
            &mut capability_registry,
            &ack_store,
            &clock,
            &ids,
            &state,
        )?,
        Command::Disable { target } => {
            cmd_disable(&cli, target, &mut module_registry, &mut capability_registry, &state)?
        }
        Command::Restrict { action } => cmd_restrict(&cli, action, &mut restriction_registry, &state)?,
        Command::Rules => cmd_rules(&cli, &project_id, &state, &all_manifests, &clock)?,
        Command::Log(args) => cmd_log(&cli, &args, &state)?,
        Command::Demo { capability_type, path } => {
            cmd_demo(&cli, &project_id, &capability_type, &path, &state, &all_manifests, &clock, &ids).await?
        }
        Command::Propose { action } => cmd_propose(
            &cli,
            action,
            &module_registry,
            &capability_registry,
            &clock,
            &ids,
            &state,
        )?,
        Command::Proposals { action } => cmd_proposals(
            &cli,
            action,
            &mut module_registry,
            &mut capability_registry,
            &mut restriction_registry,
            &ack_store,
            &resource_config_store,
            &all_manifests,
            &project_id,
            project_store.archon_home(),
            &clock,
            &ids,
            &state,
        )?,
        Command::Project { action } => cmd_project(&cli, action, &project_store, &clock)?,
    }

    Ok(())
}
