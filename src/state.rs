//! Persisted state: the last known record of every managed instance.

use std::collections::BTreeMap;
use std::path::Path;

use rulesync_reconciler::RuleRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Current state file format.
pub const STATE_VERSION: u32 = 1;

/// Contents of `.rulesync/state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,

    #[serde(default)]
    pub rules: BTreeMap<String, RuleRecord>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            rules: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load state from `path`. A missing file is empty state.
    ///
    /// # Errors
    ///
    /// I/O failures other than not-found, malformed JSON, and unknown versions.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file, starting empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        let state: Self = serde_json::from_str(&content)
            .map_err(|e| Error::invalid_state(path, e.to_string()))?;

        if state.version == STATE_VERSION {
            Ok(state)
        } else {
            Err(Error::UnsupportedStateVersion {
                found: state.version,
                expected: STATE_VERSION,
            })
        }
    }

    /// Write state to `path` through a temp file and rename, creating the
    /// parent directory when needed.
    ///
    /// # Errors
    ///
    /// I/O and serialization failures.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::invalid_state(path, e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| Error::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;

        debug!(path = %path.display(), rules = self.rules.len(), "State saved");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RuleRecord> {
        self.rules.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, record: RuleRecord) {
        self.rules.insert(name.into(), record);
    }

    pub fn remove(&mut self, name: &str) -> Option<RuleRecord> {
        self.rules.remove(name)
    }
}
