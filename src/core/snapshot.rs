//! Snapshot builder (C5, spec §4.5): assembles the effective policy into a
//! single canonical, hashable object.
//!
//! `RS_hash` is the kernel's unit of policy identity — every decision log
//! line and every ack event pins the hash in effect at the moment it was
//! made (spec I6). The canonicalization rules here are load-bearing: the
//! same inputs in any list order must produce byte-identical JSON and
//! therefore the same hash.

use crate::core::dsl::{CompiledDrr, DSL_GRAMMAR_VERSION};
use crate::core::registries::restrictions::drr_sequence;
use crate::core::registries::{CapabilityDescriptor, ModuleManifest, ResourceConfig};
use crate::core::taxonomy::{hazard_matrix, CapabilityType, ENGINE_VERSION};
use crate::core::time::Clock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The canonical, sorted projection of one enabled module into the
/// snapshot — its capability descriptors are sorted by `capability_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnabledModuleSnapshot {
    pub module_id: String,
    pub version: String,
    pub hash: String,
    pub capability_descriptors: Vec<CapabilityDescriptor>,
}

/// The effective policy object. `RS_hash = SHA-256(canonical_json(self))`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleSnapshot {
    pub engine_version: String,
    pub project_id: String,
    pub constructed_at: String,
    pub enabled_modules: Vec<EnabledModuleSnapshot>,
    pub enabled_capabilities: Vec<CapabilityType>,
    pub drr_canonical: Vec<CompiledDrr>,
    pub resource_config: ResourceConfig,
    pub ack_epoch: u64,
    pub config_hash: String,
}

/// `config_hash` is the hash of the engine's own static configuration
/// surface — taxonomy version, hazard matrix, DSL grammar version — kept
/// distinct from any one project's `resource_config` (open question, spec
/// §9, resolved in DESIGN.md). A taxonomy or hazard-matrix upgrade changes
/// `RS_hash` even for a project whose resource config never changed.
pub fn compute_config_hash() -> String {
    let pairs: Vec<(String, String)> = hazard_matrix()
        .into_iter()
        .map(|p| (p.a.as_str().to_string(), p.b.as_str().to_string()))
        .collect();
    let value = serde_json::json!({
        "engineVersion": ENGINE_VERSION,
        "dslGrammarVersion": DSL_GRAMMAR_VERSION,
        "hazardMatrix": pairs,
    });
    let bytes = serde_json::to_vec(&value).expect("config surface always serializable");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

fn canonicalize_module(manifest: &ModuleManifest) -> EnabledModuleSnapshot {
    let mut descriptors: Vec<CapabilityDescriptor> = manifest.capability_descriptors.clone();
    descriptors.sort_by(|a, b| a.capability_id.cmp(&b.capability_id));
    EnabledModuleSnapshot {
        module_id: manifest.module_id.clone(),
        version: manifest.version.clone(),
        hash: manifest.hash.clone(),
        capability_descriptors: descriptors,
    }
}

/// Assemble a canonical `RuleSnapshot` from the current registry state.
/// Every list argument may be supplied in any order — canonicalization
/// happens here, not at the call site, so the resulting hash is stable
/// under input reordering (spec's determinism property).
#[allow(clippy::too_many_arguments)]
pub fn build(
    enabled_modules: &[ModuleManifest],
    enabled_capabilities: &[CapabilityType],
    compiled_drrs: &[CompiledDrr],
    config_hash: String,
    project_id: impl Into<String>,
    clock: &dyn Clock,
    ack_epoch: u64,
    resource_config: ResourceConfig,
) -> RuleSnapshot {
    let mut modules: Vec<EnabledModuleSnapshot> =
        enabled_modules.iter().map(canonicalize_module).collect();
    modules.sort_by(|a, b| a.module_id.cmp(&b.module_id));

    let mut capabilities: Vec<CapabilityType> = enabled_capabilities.to_vec();
    capabilities.sort_by_key(|t| t.as_str());

    let mut drrs: Vec<CompiledDrr> = compiled_drrs.to_vec();
    drrs.sort_by_key(|c| drr_sequence(&c.id));

    let mut resource_config = resource_config;
    resource_config.fs_roots.sort_by(|a, b| a.id.cmp(&b.id));
    resource_config.net_allowlist.sort();

    RuleSnapshot {
        engine_version: ENGINE_VERSION.to_string(),
        project_id: project_id.into(),
        constructed_at: clock.now_iso8601(),
        enabled_modules: modules,
        enabled_capabilities: capabilities,
        drr_canonical: drrs,
        resource_config,
        ack_epoch,
        config_hash,
    }
}

/// `RS_hash = SHA-256(canonical_json(snapshot))`, lowercase hex.
pub fn hash(snapshot: &RuleSnapshot) -> String {
    let bytes = serde_json::to_vec(snapshot).expect("snapshot always serializable");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// An empty snapshot for project `project_id`: no modules, no capabilities,
/// no restrictions. Used to test/assert deny-by-default (spec I1).
pub fn empty(project_id: impl Into<String>, clock: &dyn Clock) -> RuleSnapshot {
    build(
        &[],
        &[],
        &[],
        compute_config_hash(),
        project_id,
        clock,
        0,
        ResourceConfig::default(),
    )
}
