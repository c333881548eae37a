//! Execution gate (C7, spec §4.7): sequences decision, durable logging, and
//! dispatch for one proposed action.
//!
//! `gate()` is the only place the synchronous decision core touches an
//! `async` boundary — the decision log line must be durable *before*
//! dispatch, so a crash mid-dispatch never hides what was decided.

use crate::core::adapters::{AdapterBundle, AdapterCallContext, DispatchResult, HandlerRegistry};
use crate::core::error::ArchonError;
use crate::core::registries::ResourceConfig;
use crate::core::snapshot::RuleSnapshot;
use crate::core::state_io::StateIO;
use crate::core::time::IdGenerator;
use crate::core::validate::{evaluate, CapabilityInstance, EvaluationOutcome, Outcome};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DECISIONS_LOG: &str = "logs/decisions.jsonl";

/// One line of `logs/decisions.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionLog {
    pub event_id: String,
    pub timestamp: String,
    pub agent_id: String,
    pub proposed_action: CapabilityInstance,
    pub decision: Outcome,
    pub triggered_rules: Vec<String>,
    pub rs_hash: String,
    pub input_hash: String,
    pub output_hash: Option<String>,
}

/// The gate's return value: the policy decision plus the dispatch result,
/// if dispatch happened.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResult {
    pub outcome: EvaluationOutcome,
    pub event_id: String,
    pub result: Option<DispatchResult>,
}

/// `SHA-256(canonical_json(action))`, lowercase hex.
pub fn compute_input_hash(action: &CapabilityInstance) -> String {
    let bytes = serde_json::to_vec(action).expect("capability instance always serializable");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Run one action through the gate: decide, log durably, then (on permit)
/// dispatch through `handlers`/`adapters`.
#[allow(clippy::too_many_arguments)]
pub async fn gate(
    agent_id: &str,
    action: CapabilityInstance,
    snapshot: &RuleSnapshot,
    rs_hash: &str,
    handlers: &HandlerRegistry,
    adapters: &AdapterBundle,
    resource_config: &ResourceConfig,
    clock: &dyn crate::core::time::Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<GateResult, ArchonError> {
    let input_hash = compute_input_hash(&action);
    let decision = evaluate(&action, snapshot);
    let event_id = ids.next_id();

    let log_line = DecisionLog {
        event_id: event_id.clone(),
        timestamp: clock.now_iso8601(),
        agent_id: agent_id.to_string(),
        proposed_action: action.clone(),
        decision: decision.outcome,
        triggered_rules: decision.triggered_rules.clone(),
        rs_hash: rs_hash.to_string(),
        input_hash,
        output_hash: None,
    };
    let serialized = serde_json::to_string(&log_line)?;
    state.append_line(DECISIONS_LOG, &serialized)?;

    if decision.outcome != Outcome::Permit {
        return Ok(GateResult {
            outcome: decision,
            event_id,
            result: None,
        });
    }

    let ctx = AdapterCallContext {
        agent_id: agent_id.to_string(),
        capability_instance: action,
        rs_hash: rs_hash.to_string(),
        resource_config: resource_config.clone(),
    };
    let result = handlers.dispatch(&ctx, adapters).await;

    Ok(GateResult {
        outcome: decision,
        event_id,
        result: Some(result),
    })
}
