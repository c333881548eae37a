//! Project-scoped persistence abstraction (C3, spec §4.3).
//!
//! Every registry takes a `&dyn StateIO` handle rather than reaching for a
//! global — that's what keeps two open projects from cross-reading each
//! other's state. `FileStateIO` is the durable implementation; `MemoryStateIO`
//! backs deterministic tests.

use crate::core::error::ArchonError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Project-scoped read/write surface for JSON state files and append-only
/// JSONL logs. Implementations never share state across distinct roots.
pub trait StateIO: Send + Sync {
    /// Read and deserialize `name` (a bare filename, e.g. `"enabled-modules.json"`).
    /// A missing or malformed file is not an error — it yields `fallback`,
    /// per spec's "StateIO errors on read are recoverable" policy.
    fn read_json<T>(&self, name: &str, fallback: T) -> Result<T, ArchonError>
    where
        T: DeserializeOwned;

    /// Serialize and durably write `value` to `name`, replacing its contents.
    fn write_json<T>(&self, name: &str, value: &T) -> Result<(), ArchonError>
    where
        T: Serialize;

    /// Append one line (a caller-supplied, already-serialized JSON object)
    /// to an append-only log file, creating it if absent.
    fn append_line(&self, log_name: &str, line: &str) -> Result<(), ArchonError>;

    /// Read the raw contents of a log file. Returns an empty string if the
    /// log does not exist yet.
    fn read_log_raw(&self, log_name: &str) -> Result<String, ArchonError>;

    /// Replace a log file's full contents with `lines`, one per line. Used
    /// only by the one-shot `rs_hash_after` patch on ack events — every
    /// other writer treats logs as append-only.
    fn overwrite_log(&self, log_name: &str, lines: &[String]) -> Result<(), ArchonError>;
}

/// Durable file-backed implementation, rooted at `<archon_home>/projects/<id>/`.
/// `name`/`log_name` are paths relative to that root (e.g.
/// `"state/enabled-modules.json"`, `"logs/decisions.jsonl"`,
/// `"state/acknowledgments.jsonl"`) — the project layout mixes JSON state
/// and append-only JSONL logs under `state/`, so the split is per-file, not
/// per-operation.
pub struct FileStateIO {
    root: PathBuf,
}

impl FileStateIO {
    /// Build a handle rooted at `project_root`, creating it if absent.
    pub fn new(project_root: impl Into<PathBuf>) -> Result<Self, ArchonError> {
        let root = project_root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn ensure_parent(&self, path: &Path) -> Result<(), ArchonError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl StateIO for FileStateIO {
    fn read_json<T>(&self, name: &str, fallback: T) -> Result<T, ArchonError>
    where
        T: DeserializeOwned,
    {
        let path = self.root.join(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).unwrap_or(fallback)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(fallback),
            Err(e) => Err(ArchonError::Io(e)),
        }
    }

    fn write_json<T>(&self, name: &str, value: &T) -> Result<(), ArchonError>
    where
        T: Serialize,
    {
        let path = self.root.join(name);
        self.ensure_parent(&path)?;
        let serialized = serde_json::to_string_pretty(value)?;
        fs::write(&path, serialized).map_err(|e| {
            ArchonError::Persistence(format!("writing {}: {e}", path.display()))
        })
    }

    fn append_line(&self, log_name: &str, line: &str) -> Result<(), ArchonError> {
        use std::io::Write;
        let path = self.root.join(log_name);
        self.ensure_parent(&path)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ArchonError::Persistence(format!("opening {}: {e}", path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| ArchonError::Persistence(format!("appending to {}: {e}", path.display())))
    }

    fn read_log_raw(&self, log_name: &str) -> Result<String, ArchonError> {
        let path = self.root.join(log_name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ArchonError::Io(e)),
        }
    }

    fn overwrite_log(&self, log_name: &str, lines: &[String]) -> Result<(), ArchonError> {
        let path = self.root.join(log_name);
        self.ensure_parent(&path)?;
        let mut contents = lines.join("\n");
        if !lines.is_empty() {
            contents.push('\n');
        }
        fs::write(&path, contents)
            .map_err(|e| ArchonError::Persistence(format!("writing {}: {e}", path.display())))
    }
}

/// In-memory implementation for tests: no filesystem touched, state scoped
/// to the instance.
#[derive(Default)]
pub struct MemoryStateIO {
    files: Mutex<HashMap<String, String>>,
    logs: Mutex<HashMap<String, String>>,
}

impl MemoryStateIO {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateIO for MemoryStateIO {
    fn read_json<T>(&self, name: &str, fallback: T) -> Result<T, ArchonError>
    where
        T: DeserializeOwned,
    {
        let files = self.files.lock().expect("state mutex poisoned");
        match files.get(name) {
            Some(contents) => Ok(serde_json::from_str(contents).unwrap_or(fallback)),
            None => Ok(fallback),
        }
    }

    fn write_json<T>(&self, name: &str, value: &T) -> Result<(), ArchonError>
    where
        T: Serialize,
    {
        let serialized = serde_json::to_string(value)?;
        let mut files = self.files.lock().expect("state mutex poisoned");
        files.insert(name.to_string(), serialized);
        Ok(())
    }

    fn append_line(&self, log_name: &str, line: &str) -> Result<(), ArchonError> {
        let mut logs = self.logs.lock().expect("log mutex poisoned");
        let entry = logs.entry(log_name.to_string()).or_default();
        entry.push_str(line);
        entry.push('\n');
        Ok(())
    }

    fn read_log_raw(&self, log_name: &str) -> Result<String, ArchonError> {
        let logs = self.logs.lock().expect("log mutex poisoned");
        Ok(logs.get(log_name).cloned().unwrap_or_default())
    }

    fn overwrite_log(&self, log_name: &str, lines: &[String]) -> Result<(), ArchonError> {
        let mut contents = lines.join("\n");
        if !lines.is_empty() {
            contents.push('\n');
        }
        let mut logs = self.logs.lock().expect("log mutex poisoned");
        logs.insert(log_name.to_string(), contents);
        Ok(())
    }
}

/// True if `path` already contains an `index.json` project registry —
/// the idempotency marker for legacy-state migration (spec §4.3).
pub fn has_project_index(archon_home: &Path) -> bool {
    archon_home.join("projects").join("index.json").exists()
}
