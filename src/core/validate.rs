//! Validation engine (C6, spec §4.6): the pure decision function
//! `(action, snapshot) -> (outcome, triggered_rules)`.
//!
//! No I/O, no clock, no randomness — every branch below is a total function
//! of its two arguments. Every other component defers to this one for
//! "is this allowed."

use crate::core::dsl::glob::{host_glob_match, normalize_path, path_glob_match, path_within_root};
use crate::core::dsl::{CompiledDrr, Condition, Effect};
use crate::core::registries::{FsRoot, Perm, ResourceConfig};
use crate::core::snapshot::RuleSnapshot;
use crate::core::taxonomy::{CapabilityType, RiskTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A proposed action, as submitted by an agent to the execution gate.
///
/// `params` is a `BTreeMap`, not a `HashMap`: `compute_input_hash` serializes
/// this struct directly, and a `HashMap`'s iteration order is randomized per
/// process, which would make the same action hash differently across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityInstance {
    pub project_id: String,
    pub module_id: String,
    pub capability_id: String,
    #[serde(rename = "type")]
    pub capability_type_raw: String,
    pub tier: RiskTier,
    pub params: BTreeMap<String, serde_json::Value>,
}

impl CapabilityInstance {
    fn parsed_type(&self) -> Option<CapabilityType> {
        CapabilityType::parse(&self.capability_type_raw)
    }

    fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.as_str())
    }
}

/// The three-valued policy outcome. `Escalate` is reserved: the engine never
/// produces it today, but callers must accept the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Permit,
    Deny,
    Escalate,
}

/// The full result of `evaluate`: a decision plus the rule ids (DRR ids, or
/// fixed resource-scoping reason strings) that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub outcome: Outcome,
    pub triggered_rules: Vec<String>,
}

impl EvaluationOutcome {
    fn permit(rules: Vec<String>) -> Self {
        Self {
            outcome: Outcome::Permit,
            triggered_rules: rules,
        }
    }

    fn deny(rules: Vec<String>) -> Self {
        Self {
            outcome: Outcome::Deny,
            triggered_rules: rules,
        }
    }
}

/// Extract the host component from an absolute URL. No URL-parsing crate in
/// the stack covers this, so this just splits `scheme://host[:port][/path]`.
fn extract_host(url: &str) -> Option<String> {
    let after_scheme = url.split_once("://")?.1;
    let end = after_scheme
        .find(['/', '?', '#'])
        .unwrap_or(after_scheme.len());
    let authority = &after_scheme[..end];
    if authority.is_empty() {
        return None;
    }
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Find the innermost (longest matching path prefix) fs root containing
/// `path`. Nested ro-inside-rw roots resolve to the more specific one.
fn resolve_fs_root<'a>(config: &'a ResourceConfig, path: &str) -> Option<&'a FsRoot> {
    config
        .fs_roots
        .iter()
        .filter(|root| path_within_root(path, &root.path))
        .max_by_key(|root| normalize_path(&root.path).len())
}

fn check_fs_scoping(
    action: &CapabilityInstance,
    config: &ResourceConfig,
) -> Option<EvaluationOutcome> {
    if config.fs_roots.is_empty() {
        return None;
    }
    let Some(path) = action.param_str("path") else {
        return Some(EvaluationOutcome::deny(vec!["fs_path_missing".to_string()]));
    };
    let normalized = normalize_path(path);
    let Some(root) = resolve_fs_root(config, &normalized) else {
        return Some(EvaluationOutcome::deny(vec![
            "fs_path_outside_roots".to_string(),
        ]));
    };
    let ty = action.parsed_type();
    let is_write = matches!(ty, Some(CapabilityType::FsWrite) | Some(CapabilityType::FsDelete));
    if is_write && root.perm != Perm::Rw {
        return Some(EvaluationOutcome::deny(vec![
            "fs_write_to_readonly_root".to_string(),
        ]));
    }
    None
}

fn check_net_scoping(
    action: &CapabilityInstance,
    config: &ResourceConfig,
) -> Option<EvaluationOutcome> {
    if config.net_allowlist.is_empty() {
        return Some(EvaluationOutcome::deny(vec!["net_no_allowlist".to_string()]));
    }
    let Some(url) = action.param_str("url") else {
        return Some(EvaluationOutcome::deny(vec!["net_host_missing".to_string()]));
    };
    let Some(host) = extract_host(url) else {
        return Some(EvaluationOutcome::deny(vec!["net_invalid_url".to_string()]));
    };
    let allowed = config
        .net_allowlist
        .iter()
        .any(|pattern| host_glob_match(pattern, &host));
    if allowed {
        None
    } else {
        Some(EvaluationOutcome::deny(vec![
            "net_host_not_allowlisted".to_string(),
        ]))
    }
}

fn check_exec_scoping(config: &ResourceConfig) -> Option<EvaluationOutcome> {
    if config.fs_roots.is_empty() {
        return None;
    }
    if let Some(root_id) = &config.exec_cwd_root_id {
        return if config.fs_roots.iter().any(|r| &r.id == root_id) {
            None
        } else {
            Some(EvaluationOutcome::deny(vec![
                "exec_cwd_root_not_found".to_string(),
            ]))
        };
    }
    if config.fs_roots.iter().any(|r| r.id == "workspace") {
        return None;
    }
    Some(EvaluationOutcome::deny(vec![
        "exec_no_cwd_configured".to_string(),
    ]))
}

/// A DRR condition's glob value matches as a host glob only when it targets
/// the `host` param; every other field matches as a path glob.
fn condition_matches(cond: &Condition, value: &str) -> bool {
    match cond.param_name() {
        Some("host") => host_glob_match(&cond.value, value),
        _ => path_glob_match(&cond.value, value),
    }
}

fn drr_matches(drr: &CompiledDrr, action: &CapabilityInstance) -> bool {
    drr.conditions.iter().all(|cond| match cond.param_name() {
        Some(name) => action
            .param_str(name)
            .is_some_and(|value| condition_matches(cond, value)),
        None => false,
    })
}

/// The pure `(action, snapshot) -> decision` function. The first matching
/// rule in evaluation order wins: project binding, taxonomy, module/
/// capability enablement, resource scoping, then DRR deny-first evaluation.
pub fn evaluate(action: &CapabilityInstance, snapshot: &RuleSnapshot) -> EvaluationOutcome {
    if action.project_id != snapshot.project_id {
        return EvaluationOutcome::deny(vec!["project_mismatch".to_string()]);
    }
    let Some(action_type) = action.parsed_type() else {
        return EvaluationOutcome::deny(vec![]);
    };
    if !snapshot
        .enabled_modules
        .iter()
        .any(|m| m.module_id == action.module_id)
    {
        return EvaluationOutcome::deny(vec![]);
    }
    if !snapshot.enabled_capabilities.contains(&action_type) {
        return EvaluationOutcome::deny(vec![]);
    }

    if action_type.is_fs() {
        if let Some(denied) = check_fs_scoping(action, &snapshot.resource_config) {
            return denied;
        }
    } else if action_type.is_net() {
        if let Some(denied) = check_net_scoping(action, &snapshot.resource_config) {
            return denied;
        }
    } else if action_type.is_exec() {
        if let Some(denied) = check_exec_scoping(&snapshot.resource_config) {
            return denied;
        }
    }

    let for_type: Vec<&CompiledDrr> = snapshot
        .drr_canonical
        .iter()
        .filter(|d| d.capability_type == action_type)
        .collect();

    let deny_matches: Vec<String> = for_type
        .iter()
        .filter(|d| d.effect == Effect::Deny && drr_matches(d, action))
        .map(|d| d.id.clone())
        .collect();
    if !deny_matches.is_empty() {
        return EvaluationOutcome::deny(deny_matches);
    }

    let allow_rules: Vec<&&CompiledDrr> = for_type
        .iter()
        .filter(|d| d.effect == Effect::Allow)
        .collect();

    if allow_rules.is_empty() {
        return EvaluationOutcome::permit(vec![]);
    }

    let allow_matches: Vec<String> = allow_rules
        .iter()
        .filter(|d| drr_matches(d, action))
        .map(|d| d.id.clone())
        .collect();

    if allow_matches.is_empty() {
        EvaluationOutcome::deny(vec![])
    } else {
        EvaluationOutcome::permit(allow_matches)
    }
}
