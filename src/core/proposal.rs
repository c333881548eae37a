//! Proposal queue (C8, spec §4.8): a durable `pending -> {applied, rejected,
//! failed}` state machine sitting in front of every governance mutation.
//!
//! `state/proposals.json` is rewritten wholesale on each transition — there
//! are never many proposals live at once, so there's no reason to reach for
//! an append-only log for the record itself. The audit trail is the
//! append-only half, in `logs/proposal-events.jsonl`, mirroring the
//! `event_id`-tagged JSONL convention used for decisions and acks.

use crate::core::dsl::StructuredRestrictionRule;
use crate::core::error::ArchonError;
use crate::core::governance::{apply_disable_module, apply_enable_capability, EnableCapabilityOptions};
use crate::core::registries::{
    AckStore, CapabilityRegistry, Confirmed, FsRoot, ModuleRegistry, RestrictionRegistry,
    ResourceConfigStore,
};
use crate::core::secrets::{SecretMode, SecretsStore};
use crate::core::state_io::StateIO;
use crate::core::taxonomy::{build_expected_ack_phrase, triggered_hazard_pairs, typed_ack_required, CapabilityType};
use crate::core::time::{Clock, IdGenerator};
use serde::{Deserialize, Serialize};
use std::path::Path;

const PROPOSALS_FILE: &str = "state/proposals.json";
const PROPOSAL_EVENTS_LOG: &str = "logs/proposal-events.jsonl";

/// Who submitted or approved a proposal. Only `human`, `cli`, and `ui` carry
/// approval authority (spec §4.8 step 2) — `agent` may propose but never
/// approve or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Human,
    Cli,
    Ui,
    Agent,
}

impl ActorKind {
    /// True for the kinds spec §4.8/§4.9 treat as carrying approval authority.
    pub fn has_approval_authority(&self) -> bool {
        !matches!(self, ActorKind::Agent)
    }
}

/// `{kind, id}` — the proposer or approver's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorKind,
    pub id: String,
}

/// One variant per governance change kind spec §4.8 names — a tagged
/// enum rather than a stringly-typed `kind` + untyped payload, matching
/// spec §9's "tagged variant, exhaustive matching" redesign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalChange {
    EnableCapability { capability_type: CapabilityType },
    DisableCapability { capability_type: CapabilityType },
    EnableModule { module_id: String },
    DisableModule { module_id: String },
    SetRestrictions { rules: Vec<StructuredRestrictionRule> },
    SetProjectFsRoots { fs_roots: Vec<FsRoot> },
    SetProjectNetAllowlist { net_allowlist: Vec<String> },
    SetProjectExecRoot { exec_cwd_root_id: Option<String> },
    SetSecret { name: String },
    DeleteSecret { name: String },
    SetSecretMode { portable: bool },
}

impl ProposalChange {
    /// A short, human-readable summary — the only part of `preview` that's
    /// static text; the rest of the preview is computed from current state.
    pub fn change_summary(&self) -> String {
        match self {
            ProposalChange::EnableCapability { capability_type } => {
                format!("enable capability {capability_type}")
            }
            ProposalChange::DisableCapability { capability_type } => {
                format!("disable capability {capability_type}")
            }
            ProposalChange::EnableModule { module_id } => format!("enable module {module_id}"),
            ProposalChange::DisableModule { module_id } => format!("disable module {module_id}"),
            ProposalChange::SetRestrictions { rules } => {
                format!("replace restriction rules ({} rule(s))", rules.len())
            }
            ProposalChange::SetProjectFsRoots { fs_roots } => {
                format!("set {} filesystem root(s)", fs_roots.len())
            }
            ProposalChange::SetProjectNetAllowlist { net_allowlist } => {
                format!("set net allowlist ({} host(s))", net_allowlist.len())
            }
            ProposalChange::SetProjectExecRoot { exec_cwd_root_id } => match exec_cwd_root_id {
                Some(id) => format!("set exec cwd root to {id}"),
                None => "clear exec cwd root".to_string(),
            },
            ProposalChange::SetSecret { name } => format!("set secret {name}"),
            ProposalChange::DeleteSecret { name } => format!("delete secret {name}"),
            ProposalChange::SetSecretMode { portable } => {
                format!("switch to {} secret mode", if *portable { "portable" } else { "device" })
            }
        }
    }

    /// Secrets never get their material stored on the proposal record —
    /// `set_secret`'s value and `set_secret_mode`'s passphrase are supplied
    /// at approve time only (spec §4.8).
    fn redacted(&self) -> ProposalChange {
        self.clone()
    }
}

/// Informational-only preview computed at `propose` time from current
/// state; re-validated for real at `approveProposal` time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPreview {
    pub change_summary: String,
    pub requires_typed_ack: bool,
    pub required_ack_phrase: Option<String>,
    pub hazards_triggered: Vec<String>,
    pub requires_hazard_confirm: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Applied,
    Rejected,
    Failed,
}

/// The full proposal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub created_at: String,
    pub created_by: Actor,
    pub status: ProposalStatus,
    pub change: ProposalChange,
    pub preview: ProposalPreview,
    pub approved_by: Option<Actor>,
    pub approved_at: Option<String>,
    pub applied_at: Option<String>,
    pub rejected_by: Option<Actor>,
    pub rejection_reason: Option<String>,
    pub failed_at: Option<String>,
    pub failure_reason: Option<String>,
    pub rs_hash_after: Option<String>,
}

/// The projection `listProposals` returns — no `change`/`preview` detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: String,
    pub created_at: String,
    pub created_by: Actor,
    pub status: ProposalStatus,
    pub change_summary: String,
}

impl From<&Proposal> for ProposalSummary {
    fn from(p: &Proposal) -> Self {
        Self {
            id: p.id.clone(),
            created_at: p.created_at.clone(),
            created_by: p.created_by.clone(),
            status: p.status,
            change_summary: p.preview.change_summary.clone(),
        }
    }
}

/// Result of `approveProposal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveResult {
    pub applied: bool,
    pub ack_epoch: u64,
    pub rs_hash_after: Option<String>,
    pub error: Option<String>,
}

/// One line of `logs/proposal-events.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProposalEvent {
    event_id: String,
    timestamp: String,
    proposal_id: String,
    transition: String,
    actor: Option<Actor>,
}

/// Bundles the registries a governance-applying transition needs. Built
/// fresh by the caller from current state for every `approveProposal` call
/// (spec §4.8 step 3: "re-validate against *current* state").
pub struct GovernanceContext<'a> {
    pub module_registry: &'a mut ModuleRegistry,
    pub capability_registry: &'a mut CapabilityRegistry,
    pub restriction_registry: &'a mut RestrictionRegistry,
    pub ack_store: &'a AckStore,
    pub resource_config_store: &'a ResourceConfigStore,
    /// Root the secrets envelope (`<archon_home>/device.key`) and the
    /// project's own `state/secrets.enc.json` are sealed under.
    pub archon_home: &'a Path,
}

/// Operator-supplied inputs only relevant at approve time.
#[derive(Debug, Clone, Default)]
pub struct ApproveOptions {
    pub typed_ack_phrase: Option<String>,
    pub hazard_confirmed_pairs: Vec<(CapabilityType, CapabilityType)>,
    pub secret_value: Option<String>,
    pub passphrase: Option<String>,
}

fn load_proposals(state: &dyn StateIO) -> Result<Vec<Proposal>, ArchonError> {
    state.read_json(PROPOSALS_FILE, Vec::new())
}

fn save_proposals(proposals: &[Proposal], state: &dyn StateIO) -> Result<(), ArchonError> {
    state.write_json(PROPOSALS_FILE, proposals)
}

fn append_event(
    proposal_id: &str,
    transition: &str,
    actor: Option<Actor>,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<(), ArchonError> {
    let event = ProposalEvent {
        event_id: ids.next_id(),
        timestamp: clock.now_iso8601(),
        proposal_id: proposal_id.to_string(),
        transition: transition.to_string(),
        actor,
    };
    let line = serde_json::to_string(&event)?;
    state.append_line(PROPOSAL_EVENTS_LOG, &line)
}

/// Compute the preview for `change` from current registry/ack state.
/// Informational only — `approveProposal` always re-derives this live.
fn compute_preview(
    change: &ProposalChange,
    module_registry: &ModuleRegistry,
    capability_registry: &CapabilityRegistry,
) -> ProposalPreview {
    let change_summary = change.change_summary();
    let ty = match change {
        ProposalChange::EnableCapability { capability_type } => Some(*capability_type),
        _ => None,
    };

    let Some(ty) = ty else {
        return ProposalPreview {
            change_summary,
            requires_typed_ack: false,
            required_ack_phrase: None,
            hazards_triggered: Vec::new(),
            requires_hazard_confirm: false,
        };
    };

    let tier = ty.tier();
    let requires_typed_ack = typed_ack_required(tier);
    let required_ack_phrase = requires_typed_ack.then(|| build_expected_ack_phrase(tier, ty));
    let already_enabled = capability_registry.list_enabled_capabilities();
    let triggered = triggered_hazard_pairs(ty, &already_enabled);
    let hazards_triggered: Vec<String> = triggered
        .iter()
        .map(|pair| {
            let partner = pair.partner_of(ty).expect("triggered pair always involves ty");
            format!("{ty} + {partner}")
        })
        .collect();
    let requires_hazard_confirm = !hazards_triggered.is_empty();
    let _ = module_registry; // declares-type check happens at approve time, not preview time

    ProposalPreview {
        change_summary,
        requires_typed_ack,
        required_ack_phrase,
        hazards_triggered,
        requires_hazard_confirm,
    }
}

/// `propose(change, createdBy) -> Proposal`.
pub fn propose(
    change: ProposalChange,
    created_by: Actor,
    module_registry: &ModuleRegistry,
    capability_registry: &CapabilityRegistry,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<Proposal, ArchonError> {
    let preview = compute_preview(&change, module_registry, capability_registry);
    let proposal = Proposal {
        id: ids.next_id(),
        created_at: clock.now_iso8601(),
        created_by: created_by.clone(),
        status: ProposalStatus::Pending,
        change: change.redacted(),
        preview,
        approved_by: None,
        approved_at: None,
        applied_at: None,
        rejected_by: None,
        rejection_reason: None,
        failed_at: None,
        failure_reason: None,
        rs_hash_after: None,
    };

    let mut proposals = load_proposals(state)?;
    proposals.push(proposal.clone());
    save_proposals(&proposals, state)?;
    append_event(&proposal.id, "proposed", Some(created_by), clock, ids, state)?;
    Ok(proposal)
}

/// `listProposals({status?}) -> ProposalSummary[]`, newest first.
pub fn list_proposals(
    status: Option<ProposalStatus>,
    state: &dyn StateIO,
) -> Result<Vec<ProposalSummary>, ArchonError> {
    let mut proposals = load_proposals(state)?;
    proposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(proposals
        .iter()
        .filter(|p| status.is_none_or(|s| p.status == s))
        .map(ProposalSummary::from)
        .collect())
}

/// `getProposal(id) -> Proposal?`.
pub fn get_proposal(id: &str, state: &dyn StateIO) -> Result<Option<Proposal>, ArchonError> {
    Ok(load_proposals(state)?.into_iter().find(|p| p.id == id))
}

fn recoverable_error_message(err: &ArchonError) -> Option<String> {
    match err {
        ArchonError::AckPhraseMismatch { .. }
        | ArchonError::HazardUnconfirmed(_)
        | ArchonError::SecretValueRequired(_)
        | ArchonError::TaxonomyViolation(_)
        | ArchonError::ModuleNotRegistered(_)
        | ArchonError::Crypto(_) => Some(err.to_string()),
        _ => None,
    }
}

/// Outcome of a successful [`commit_change`]: the new ack epoch, plus any
/// ack/hazard event ids minted during commit (only `enable_capability`
/// produces any) so the caller can patch their `rs_hash_after`.
struct CommitOutcome {
    ack_epoch: u64,
    ack_event_id: Option<String>,
    hazard_event_ids: Vec<String>,
}

/// Commit `change` against current registry state via C9 (or directly, for
/// change kinds C9 doesn't cover).
fn commit_change(
    change: &ProposalChange,
    opts: &ApproveOptions,
    ctx: &mut GovernanceContext,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<CommitOutcome, ArchonError> {
    match change {
        ProposalChange::EnableCapability { capability_type } => {
            let enable_opts = EnableCapabilityOptions {
                typed_ack_phrase: opts.typed_ack_phrase.clone(),
                hazard_confirmed_pairs: opts.hazard_confirmed_pairs.clone(),
            };
            let result = apply_enable_capability(
                *capability_type,
                &enable_opts,
                ctx.module_registry,
                ctx.capability_registry,
                ctx.ack_store,
                clock,
                ids,
                state,
            )?;
            Ok(CommitOutcome {
                ack_epoch: result.ack_epoch,
                ack_event_id: result.ack_event_id,
                hazard_event_ids: result.hazard_event_ids,
            })
        }
        ProposalChange::DisableCapability { capability_type } => {
            ctx.capability_registry.disable_capability(*capability_type, state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::EnableModule { module_id } => {
            ctx.module_registry.enable(module_id, Confirmed::attest(), state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::DisableModule { module_id } => {
            apply_disable_module(
                module_id,
                ctx.module_registry,
                ctx.capability_registry,
                Confirmed::attest(),
                state,
            )?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::SetRestrictions { rules } => {
            ctx.restriction_registry.replace_all(rules.clone(), state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::SetProjectFsRoots { fs_roots } => {
            ctx.resource_config_store.set_fs_roots(fs_roots.clone(), state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::SetProjectNetAllowlist { net_allowlist } => {
            ctx.resource_config_store
                .set_net_allowlist(net_allowlist.clone(), state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::SetProjectExecRoot { exec_cwd_root_id } => {
            ctx.resource_config_store
                .set_exec_cwd_root_id(exec_cwd_root_id.clone(), state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::SetSecret { name } => {
            let Some(value) = &opts.secret_value else {
                return Err(ArchonError::SecretValueRequired(name.clone()));
            };
            let mode = ctx.resource_config_store.load(state)?.secret_mode;
            SecretsStore::new().set_secret(
                ctx.archon_home,
                mode,
                opts.passphrase.as_deref(),
                name,
                value,
                state,
            )?;
            ctx.resource_config_store.increment_secrets_epoch(state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::DeleteSecret { name } => {
            let mode = ctx.resource_config_store.load(state)?.secret_mode;
            SecretsStore::new().delete_secret(
                ctx.archon_home,
                mode,
                opts.passphrase.as_deref(),
                name,
                state,
            )?;
            ctx.resource_config_store.increment_secrets_epoch(state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
        ProposalChange::SetSecretMode { portable } => {
            let new_mode = if *portable { SecretMode::Portable } else { SecretMode::Device };
            if *portable && opts.passphrase.is_none() {
                return Err(ArchonError::SecretValueRequired("passphrase".to_string()));
            }
            let old_mode = ctx.resource_config_store.load(state)?.secret_mode;
            let store = SecretsStore::new();
            let secrets = store.load(ctx.archon_home, old_mode, opts.passphrase.as_deref(), state)?;
            store.save(ctx.archon_home, new_mode, opts.passphrase.as_deref(), &secrets, state)?;
            ctx.resource_config_store.set_secret_mode(new_mode, state)?;
            ctx.resource_config_store.increment_secrets_epoch(state)?;
            no_ack_events(ctx.ack_store.ack_epoch(state)?)
        }
    }
}

fn no_ack_events(ack_epoch: u64) -> Result<CommitOutcome, ArchonError> {
    Ok(CommitOutcome {
        ack_epoch,
        ack_event_id: None,
        hazard_event_ids: Vec::new(),
    })
}

/// `approveProposal(id, opts, approver) -> ApproveResult`.
#[allow(clippy::too_many_arguments)]
pub fn approve_proposal(
    id: &str,
    opts: &ApproveOptions,
    approver: Actor,
    ctx: &mut GovernanceContext,
    build_snapshot_hash: impl FnOnce() -> String,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<ApproveResult, ArchonError> {
    let unchanged_epoch = ctx.ack_store.ack_epoch(state)?;
    let mut proposals = load_proposals(state)?;
    let Some(proposal) = proposals.iter_mut().find(|p| p.id == id) else {
        return Ok(ApproveResult {
            applied: false,
            ack_epoch: unchanged_epoch,
            rs_hash_after: None,
            error: Some("not found".to_string()),
        });
    };

    if proposal.status != ProposalStatus::Pending {
        return Ok(ApproveResult {
            applied: false,
            ack_epoch: unchanged_epoch,
            rs_hash_after: None,
            error: Some("not pending".to_string()),
        });
    }

    if !approver.kind.has_approval_authority() {
        return Ok(ApproveResult {
            applied: false,
            ack_epoch: unchanged_epoch,
            rs_hash_after: None,
            error: Some("authority insufficient".to_string()),
        });
    }

    match commit_change(&proposal.change, opts, ctx, clock, ids, state) {
        Ok(outcome) => {
            let rs_hash_after = build_snapshot_hash();
            proposal.status = ProposalStatus::Applied;
            proposal.approved_by = Some(approver.clone());
            proposal.approved_at = Some(clock.now_iso8601());
            proposal.applied_at = Some(clock.now_iso8601());
            proposal.rs_hash_after = Some(rs_hash_after.clone());
            if let Some(event_id) = &outcome.ack_event_id {
                ctx.ack_store.patch_rs_hash_after(event_id, &rs_hash_after, state)?;
            }
            for event_id in &outcome.hazard_event_ids {
                ctx.ack_store.patch_rs_hash_after(event_id, &rs_hash_after, state)?;
            }
            save_proposals(&proposals, state)?;
            append_event(id, "applied", Some(approver), clock, ids, state)?;
            Ok(ApproveResult {
                applied: true,
                ack_epoch: outcome.ack_epoch,
                rs_hash_after: Some(rs_hash_after),
                error: None,
            })
        }
        Err(err) => {
            if let Some(message) = recoverable_error_message(&err) {
                save_proposals(&proposals, state)?;
                Ok(ApproveResult {
                    applied: false,
                    ack_epoch: unchanged_epoch,
                    rs_hash_after: None,
                    error: Some(message),
                })
            } else {
                proposal.status = ProposalStatus::Failed;
                proposal.failed_at = Some(clock.now_iso8601());
                proposal.failure_reason = Some(err.to_string());
                save_proposals(&proposals, state)?;
                append_event(id, "failed", None, clock, ids, state)?;
                Ok(ApproveResult {
                    applied: false,
                    ack_epoch: unchanged_epoch,
                    rs_hash_after: None,
                    error: Some(err.to_string()),
                })
            }
        }
    }
}

/// `rejectProposal(id, rejector, reason?) -> Proposal?`.
pub fn reject_proposal(
    id: &str,
    rejector: Actor,
    reason: Option<String>,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<Option<Proposal>, ArchonError> {
    if !rejector.kind.has_approval_authority() {
        return Err(ArchonError::AuthorityInsufficient(
            "agent may not reject proposals".to_string(),
        ));
    }

    let mut proposals = load_proposals(state)?;
    let Some(proposal) = proposals.iter_mut().find(|p| p.id == id) else {
        return Ok(None);
    };
    if proposal.status != ProposalStatus::Pending {
        return Err(ArchonError::ProposalNotPending(id.to_string()));
    }

    proposal.status = ProposalStatus::Rejected;
    proposal.rejected_by = Some(rejector.clone());
    proposal.rejection_reason = reason;
    let result = proposal.clone();
    save_proposals(&proposals, state)?;
    append_event(id, "rejected", Some(rejector), clock, ids, state)?;
    Ok(Some(result))
}
