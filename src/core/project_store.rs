//! Project registry: resolves `<archon_home>`, tracks known projects and the
//! active one, and migrates legacy single-project state on first use
//! (spec §4.3).

use crate::core::error::ArchonError;
use crate::core::state_io::FileStateIO;
use crate::core::time::Clock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One registered project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: String,
    pub created_at: String,
}

/// The `projects/index.json` document: `{activeProjectId, projects[]}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProjectIndex {
    #[serde(rename = "activeProjectId")]
    pub active_project_id: Option<String>,
    pub projects: Vec<ProjectRecord>,
}

const DEFAULT_PROJECT_ID: &str = "default";

/// Resolve `<archon_home>`: `ARCHON_HOME` env var takes precedence, then
/// `ARCHON_STATE_DIR`, then the OS-default config directory.
pub fn resolve_archon_home() -> Result<PathBuf, ArchonError> {
    if let Ok(home) = std::env::var("ARCHON_HOME") {
        return Ok(PathBuf::from(home));
    }
    if let Ok(state_dir) = std::env::var("ARCHON_STATE_DIR") {
        return Ok(PathBuf::from(state_dir));
    }
    dirs::config_dir()
        .map(|p| p.join("archon"))
        .ok_or_else(|| {
            ArchonError::Persistence("could not resolve an OS-default config directory".into())
        })
}

fn index_path(archon_home: &Path) -> PathBuf {
    archon_home.join("projects").join("index.json")
}

fn project_root(archon_home: &Path, project_id: &str) -> PathBuf {
    archon_home.join("projects").join(project_id)
}

/// Owns the project registry rooted at a resolved `archon_home`.
pub struct ProjectStore {
    archon_home: PathBuf,
}

impl ProjectStore {
    pub fn new(archon_home: impl Into<PathBuf>) -> Self {
        Self {
            archon_home: archon_home.into(),
        }
    }

    pub fn archon_home(&self) -> &Path {
        &self.archon_home
    }

    fn read_index(&self) -> Result<ProjectIndex, ArchonError> {
        let path = index_path(&self.archon_home);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                Ok(serde_json::from_str(&contents).unwrap_or_default())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectIndex::default()),
            Err(e) => Err(ArchonError::Io(e)),
        }
    }

    fn write_index(&self, index: &ProjectIndex) -> Result<(), ArchonError> {
        let path = index_path(&self.archon_home);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(index)?;
        fs::write(&path, serialized)
            .map_err(|e| ArchonError::Persistence(format!("writing {}: {e}", path.display())))
    }

    /// Ensure the registry exists, migrating legacy top-level `state/`/`logs/`
    /// into a `default` project on first call. Idempotent by the presence of
    /// `index.json` — a second call is a no-op even if legacy dirs remain.
    pub fn ensure_initialized(&self, clock: &dyn Clock) -> Result<(), ArchonError> {
        if index_path(&self.archon_home).exists() {
            return Ok(());
        }

        let legacy_state = self.archon_home.join("state");
        let legacy_logs = self.archon_home.join("logs");
        let default_root = project_root(&self.archon_home, DEFAULT_PROJECT_ID);

        if legacy_state.is_dir() || legacy_logs.is_dir() {
            fs::create_dir_all(&default_root)?;
            if legacy_state.is_dir() {
                fs::rename(&legacy_state, default_root.join("state"))?;
            }
            if legacy_logs.is_dir() {
                fs::rename(&legacy_logs, default_root.join("logs"))?;
            }
        }

        let index = ProjectIndex {
            active_project_id: Some(DEFAULT_PROJECT_ID.to_string()),
            projects: vec![ProjectRecord {
                id: DEFAULT_PROJECT_ID.to_string(),
                created_at: clock.now_iso8601(),
            }],
        };
        self.write_index(&index)
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>, ArchonError> {
        Ok(self.read_index()?.projects)
    }

    pub fn current_project_id(&self) -> Result<Option<String>, ArchonError> {
        Ok(self.read_index()?.active_project_id)
    }

    /// Register a new project id, failing if it already exists.
    pub fn create_project(&self, id: &str, clock: &dyn Clock) -> Result<ProjectRecord, ArchonError> {
        let mut index = self.read_index()?;
        if index.projects.iter().any(|p| p.id == id) {
            return Err(ArchonError::Persistence(format!(
                "project '{id}' already exists"
            )));
        }
        let record = ProjectRecord {
            id: id.to_string(),
            created_at: clock.now_iso8601(),
        };
        index.projects.push(record.clone());
        if index.active_project_id.is_none() {
            index.active_project_id = Some(id.to_string());
        }
        self.write_index(&index)?;
        fs::create_dir_all(project_root(&self.archon_home, id))?;
        Ok(record)
    }

    /// Switch the active project, failing if `id` is not registered.
    pub fn open_project(&self, id: &str) -> Result<(), ArchonError> {
        let mut index = self.read_index()?;
        if !index.projects.iter().any(|p| p.id == id) {
            return Err(ArchonError::NotFound(format!("project '{id}'")));
        }
        index.active_project_id = Some(id.to_string());
        self.write_index(&index)
    }

    /// Build a `StateIO` handle for the given project's on-disk root.
    pub fn state_io_for(&self, project_id: &str) -> Result<FileStateIO, ArchonError> {
        FileStateIO::new(project_root(&self.archon_home, project_id))
    }
}
