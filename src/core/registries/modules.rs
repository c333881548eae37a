//! Module registry (C4): registration and enable/disable lifecycle.
//!
//! Modules always start `Disabled`; `register` is one-shot per process (a
//! duplicate `module_id` fails outright, there is no re-registration path).

use crate::core::error::ArchonError;
use crate::core::registries::Confirmed;
use crate::core::state_io::StateIO;
use crate::core::taxonomy::{CapabilityType, RiskTier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

const ENABLED_MODULES_FILE: &str = "state/enabled-modules.json";

/// One capability a module declares it can perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub capability_id: String,
    #[serde(rename = "type")]
    pub capability_type: CapabilityType,
    pub tier: RiskTier,
    pub params_schema: serde_json::Value,
    pub ack_required: bool,
    #[serde(default)]
    pub default_enabled: bool,
    #[serde(default)]
    pub hazards: Vec<String>,
}

/// A signed-equivalent record describing one module and its declared
/// capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleManifest {
    pub module_id: String,
    pub version: String,
    pub hash: String,
    pub capability_descriptors: Vec<CapabilityDescriptor>,
    pub registered_at: String,
}

/// In-process registry of module manifests plus the persisted
/// enabled/disabled set.
pub struct ModuleRegistry {
    manifests: HashMap<String, ModuleManifest>,
    enabled: BTreeSet<String>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            manifests: HashMap::new(),
            enabled: BTreeSet::new(),
        }
    }

    /// Register a module manifest. Fails if `module_id` is already
    /// registered. New modules always start `Disabled`.
    pub fn register(&mut self, manifest: ModuleManifest) -> Result<(), ArchonError> {
        if self.manifests.contains_key(&manifest.module_id) {
            return Err(ArchonError::TaxonomyViolation(format!(
                "duplicate module_id '{}'",
                manifest.module_id
            )));
        }
        self.manifests.insert(manifest.module_id.clone(), manifest);
        Ok(())
    }

    /// Rehydrate the enabled set from persisted state. Call once after all
    /// `register` calls for this process.
    pub fn apply_persisted_state(&mut self, state: &dyn StateIO) -> Result<(), ArchonError> {
        let ids: Vec<String> = state.read_json(ENABLED_MODULES_FILE, Vec::new())?;
        self.enabled = ids.into_iter().collect();
        Ok(())
    }

    pub fn enable(
        &mut self,
        module_id: &str,
        _confirmed: Confirmed,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        if !self.manifests.contains_key(module_id) {
            return Err(ArchonError::ModuleNotRegistered(module_id.to_string()));
        }
        self.enabled.insert(module_id.to_string());
        self.persist(state)
    }

    pub fn disable(
        &mut self,
        module_id: &str,
        _confirmed: Confirmed,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        if !self.manifests.contains_key(module_id) {
            return Err(ArchonError::ModuleNotRegistered(module_id.to_string()));
        }
        self.enabled.remove(module_id);
        self.persist(state)
    }

    fn persist(&self, state: &dyn StateIO) -> Result<(), ArchonError> {
        let sorted: Vec<&String> = self.enabled.iter().collect();
        state.write_json(ENABLED_MODULES_FILE, &sorted)
    }

    pub fn is_enabled(&self, module_id: &str) -> bool {
        self.enabled.contains(module_id)
    }

    pub fn enabled_ids(&self) -> Vec<String> {
        self.enabled.iter().cloned().collect()
    }

    pub fn manifest(&self, module_id: &str) -> Option<&ModuleManifest> {
        self.manifests.get(module_id)
    }

    pub fn manifests(&self) -> impl Iterator<Item = &ModuleManifest> {
        self.manifests.values()
    }

    /// Every module that declares at least one capability descriptor of
    /// `ty`, restricted to modules currently enabled.
    pub fn enabled_modules_declaring(&self, ty: CapabilityType) -> Vec<&ModuleManifest> {
        self.enabled
            .iter()
            .filter_map(|id| self.manifests.get(id))
            .filter(|m| {
                m.capability_descriptors
                    .iter()
                    .any(|d| d.capability_type == ty)
            })
            .collect()
    }
}
