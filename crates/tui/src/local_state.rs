use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use grid_engine::{EngineError, ExpansionCache, ExpansionSnapshot};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LocalState {
    #[serde(default)]
    pub expansion: Option<ExpansionSnapshot>,
}

impl LocalState {
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, payload)?;
        if fs::rename(&tmp, path).is_err() {
            fs::copy(&tmp, path)?;
            let _ = fs::remove_file(&tmp);
        }
        Ok(())
    }
}

/// Expansion cache kept in the local state file.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExpansionCache for FileCache {
    fn read(&self) -> Option<ExpansionSnapshot> {
        match LocalState::load(&self.path) {
            Ok(state) => state.expansion,
            Err(err) => {
                warn!(path = %self.path.display(), "ignoring unreadable state: {err}");
                None
            }
        }
    }

    fn write(&mut self, snapshot: &ExpansionSnapshot) -> std::result::Result<(), EngineError> {
        let mut state = LocalState::load(&self.path).unwrap_or_default();
        state.expansion = Some(snapshot.clone());
        state
            .save(&self.path)
            .map_err(|err| EngineError::Cache(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use grid_engine::{ExpansionMode, TxId};

    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("grid_tui_{}", uuid::Uuid::new_v4()))
            .join("state.json")
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let cache = FileCache::new(temp_path());
        assert_eq!(cache.read(), None);
    }

    #[test]
    fn snapshot_survives_reload() {
        let path = temp_path();
        let snapshot = ExpansionSnapshot {
            mode: ExpansionMode::Expand,
            override_ids: [TxId::from("p")].into_iter().collect(),
        };

        let mut cache = FileCache::new(&path);
        cache.write(&snapshot).unwrap();

        assert_eq!(FileCache::new(&path).read(), Some(snapshot));
        assert!(!path.with_extension("tmp").exists());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(FileCache::new(&path).read(), None);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
