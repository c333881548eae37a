//! Resource config store (C4): filesystem roots, net allowlist, exec cwd
//! root, and secrets epoch — one JSON document per project with
//! independent mutators that each preserve the other fields.

use crate::core::error::ArchonError;
use crate::core::secrets::SecretMode;
use crate::core::state_io::StateIO;
use serde::{Deserialize, Serialize};

const RESOURCE_CONFIG_FILE: &str = "state/resource-config.json";

/// Read/write permission granted on a filesystem root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perm {
    Ro,
    Rw,
}

/// A named, permissioned filesystem root that `fs.*`/`exec.*` actions are
/// scoped against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsRoot {
    pub id: String,
    pub path: String,
    pub perm: Perm,
}

/// Per-project resource scoping configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceConfig {
    pub fs_roots: Vec<FsRoot>,
    pub net_allowlist: Vec<String>,
    pub exec_cwd_root_id: Option<String>,
    pub secrets_epoch: u64,
    #[serde(default)]
    pub secret_mode: SecretMode,
}

pub struct ResourceConfigStore;

impl Default for ResourceConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceConfigStore {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, state: &dyn StateIO) -> Result<ResourceConfig, ArchonError> {
        state.read_json(RESOURCE_CONFIG_FILE, ResourceConfig::default())
    }

    /// Replace the fs roots, sorted by id for canonical persistence.
    pub fn set_fs_roots(
        &self,
        mut roots: Vec<FsRoot>,
        state: &dyn StateIO,
    ) -> Result<ResourceConfig, ArchonError> {
        roots.sort_by(|a, b| a.id.cmp(&b.id));
        let mut config = self.load(state)?;
        config.fs_roots = roots;
        state.write_json(RESOURCE_CONFIG_FILE, &config)?;
        Ok(config)
    }

    /// Replace the net allowlist, sorted lexicographically.
    pub fn set_net_allowlist(
        &self,
        mut allowlist: Vec<String>,
        state: &dyn StateIO,
    ) -> Result<ResourceConfig, ArchonError> {
        allowlist.sort();
        let mut config = self.load(state)?;
        config.net_allowlist = allowlist;
        state.write_json(RESOURCE_CONFIG_FILE, &config)?;
        Ok(config)
    }

    pub fn set_exec_cwd_root_id(
        &self,
        root_id: Option<String>,
        state: &dyn StateIO,
    ) -> Result<ResourceConfig, ArchonError> {
        let mut config = self.load(state)?;
        config.exec_cwd_root_id = root_id;
        state.write_json(RESOURCE_CONFIG_FILE, &config)?;
        Ok(config)
    }

    pub fn increment_secrets_epoch(
        &self,
        state: &dyn StateIO,
    ) -> Result<ResourceConfig, ArchonError> {
        let mut config = self.load(state)?;
        config.secrets_epoch += 1;
        state.write_json(RESOURCE_CONFIG_FILE, &config)?;
        Ok(config)
    }

    pub fn set_secret_mode(
        &self,
        mode: SecretMode,
        state: &dyn StateIO,
    ) -> Result<ResourceConfig, ArchonError> {
        let mut config = self.load(state)?;
        config.secret_mode = mode;
        state.write_json(RESOURCE_CONFIG_FILE, &config)?;
        Ok(config)
    }
}
