use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Persistence, PersistenceError};
use crate::identity::AgentIdentity;
use crate::rl::approximator::Weights;

const FLEET_FILE: &str = "fleet.json";
const MODELS_DIR: &str = "models";

#[derive(Debug, Default, Serialize, Deserialize)]
struct FleetFile {
    agents: Vec<AgentIdentity>,
}

/// JSON files under a data directory:
///
/// ```text
/// <data_dir>/fleet.json
/// <data_dir>/models/<agent>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fleet_path(&self) -> PathBuf {
        self.root.join(FLEET_FILE)
    }

    pub fn model_path(&self, identity: &AgentIdentity) -> PathBuf {
        self.root
            .join(MODELS_DIR)
            .join(format!("{}.json", identity.as_str()))
    }

    /// Reads `path`, mapping "not found" to `None`.
    fn read(path: &Path) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    /// Writes through a sibling temp file so readers never see a torn file.
    fn write(path: &Path, contents: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| PersistenceError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| PersistenceError::io(path, e))
    }
}

impl Persistence for JsonFileStore {
    fn load_fleet_config(&self) -> Result<Vec<AgentIdentity>, PersistenceError> {
        let path = self.fleet_path();
        let Some(text) = Self::read(&path)? else {
            debug!(path = %path.display(), "no fleet file, starting with an empty roster");
            return Ok(Vec::new());
        };
        let file: FleetFile =
            serde_json::from_str(&text).map_err(|e| PersistenceError::decode(&path, e))?;
        Ok(file.agents)
    }

    fn save_fleet_config(&self, roster: &[AgentIdentity]) -> Result<(), PersistenceError> {
        let file = FleetFile {
            agents: roster.to_vec(),
        };
        Self::write(&self.fleet_path(), &serde_json::to_string_pretty(&file)?)
    }

    fn load_model_weights(&self, identity: &AgentIdentity) -> Result<Option<Weights>, PersistenceError> {
        let path = self.model_path(identity);
        match Self::read(&path)? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| PersistenceError::decode(&path, e)),
            None => Ok(None),
        }
    }

    fn save_model_weights(&self, identity: &AgentIdentity, weights: &Weights) -> Result<(), PersistenceError> {
        Self::write(&self.model_path(identity), &serde_json::to_string(weights)?)
    }
}
