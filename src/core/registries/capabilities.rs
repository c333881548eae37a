//! Capability registry (C4): the enabled `CapabilityType` set.

use crate::core::error::ArchonError;
use crate::core::state_io::StateIO;
use crate::core::taxonomy::CapabilityType;
use std::collections::HashSet;

const ENABLED_CAPABILITIES_FILE: &str = "state/enabled-capabilities.json";

/// Tracks which capability types are currently enabled for a project.
/// Enablement itself is gated by [`crate::core::governance`], which is the
/// only caller that should invoke `enable_capability` directly.
pub struct CapabilityRegistry {
    enabled: HashSet<CapabilityType>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            enabled: HashSet::new(),
        }
    }

    pub fn apply_persisted_state(&mut self, state: &dyn StateIO) -> Result<(), ArchonError> {
        let types: Vec<CapabilityType> = state.read_json(ENABLED_CAPABILITIES_FILE, Vec::new())?;
        self.enabled = types.into_iter().collect();
        Ok(())
    }

    pub fn enable_capability(
        &mut self,
        ty: CapabilityType,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        self.enabled.insert(ty);
        self.persist(state)
    }

    pub fn disable_capability(
        &mut self,
        ty: CapabilityType,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        self.enabled.remove(&ty);
        self.persist(state)
    }

    fn persist(&self, state: &dyn StateIO) -> Result<(), ArchonError> {
        state.write_json(ENABLED_CAPABILITIES_FILE, &self.list_enabled_capabilities())
    }

    pub fn is_enabled(&self, ty: CapabilityType) -> bool {
        self.enabled.contains(&ty)
    }

    /// Sorted by type string, per spec §4.4.
    pub fn list_enabled_capabilities(&self) -> Vec<CapabilityType> {
        let mut types: Vec<CapabilityType> = self.enabled.iter().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}
