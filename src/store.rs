//! Reads and writes the single workflow document for one storage location.
//!
//! The store knows nothing about phases or steps. It checks the schema
//! `version` tag on load and replaces the file atomically on save: the JSON
//! is written to a temp file in the same directory and then persisted over
//! the target, so a failed write never leaves a truncated document behind.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::state::{WorkflowState, STATE_VERSION};

/// File name of the document inside the storage directory.
pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<base_dir>/<storage_dir>/state.json`
    pub fn for_config(config: &WorkflowConfig, base_dir: &Path) -> Self {
        Self::new(base_dir.join(config.storage_dir()).join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<WorkflowState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(WorkflowError::NotFound),
            Err(e) => return Err(e.into()),
        };

        // Check the schema tag before committing to the full shape.
        let raw: Value = serde_json::from_str(&content)?;
        let version = raw
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::MalformedDocument("missing version tag".into()))?;
        if version != STATE_VERSION {
            return Err(WorkflowError::MalformedDocument(format!(
                "unsupported schema version {version} (expected {STATE_VERSION})"
            )));
        }

        let state: WorkflowState = serde_json::from_value(raw)?;
        debug!(path = %self.path.display(), phases = state.phases.len(), "loaded workflow state");
        Ok(state)
    }

    /// Stamps `last_modified_at` and replaces the stored document.
    pub fn save(&self, state: &mut WorkflowState) -> Result<()> {
        state.last_modified_at = Utc::now();
        let content = serde_json::to_string_pretty(state)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), bytes = content.len(), "saved workflow state");
        Ok(())
    }

    /// Deletes the document. A missing document is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
