//! Persistence: save and load the document store to a JSON file.
//! Orders, tables and sequence counters survive a restart.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::PosError;
use crate::types::{Order, Table};

/// Full persisted state of the document store.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PersistedState {
    pub orders: Vec<Order>,
    pub tables: Vec<Table>,
    pub counters: BTreeMap<String, u64>,
}

/// Borrowed view with the same layout as [`PersistedState`], saved without
/// cloning the documents.
#[derive(Debug, serde::Serialize)]
pub struct StateView<'a> {
    pub orders: Vec<&'a Order>,
    pub tables: Vec<&'a Table>,
    pub counters: &'a BTreeMap<String, u64>,
}

/// File-based persistence: one JSON file, rewritten after every mutation.
#[derive(Clone, Debug)]
pub struct FilePersistence {
    path: std::path::PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save state to file. Writes a sibling temp file then renames it over the target.
    pub fn save<S: serde::Serialize>(&self, state: &S) -> Result<(), PosError> {
        let json = serde_json::to_string_pretty(state).map_err(PosError::persistence)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(PosError::persistence)?;
        std::fs::rename(&tmp, &self.path).map_err(PosError::persistence)
    }

    /// Load state from file. Returns None if the file does not exist yet.
    pub fn load(&self) -> Result<Option<PersistedState>, PosError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PosError::persistence(e)),
        };
        let state: PersistedState = serde_json::from_str(&data).map_err(PosError::persistence)?;
        Ok(Some(state))
    }
}
