//! Fleet configuration: server address, schedule, agent behaviour, learning
//! hyperparameters and storage location.
//!
//! Every section falls back to compiled-in defaults, so an empty JSON object
//! is a valid configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::AgentConfig;
use crate::rl::LearningConfig;
use crate::scheduler::ScheduleConfig;

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "CRAFTFLEET_CONFIG";

/// Upper bound on concurrently scheduled agents.
pub const MAX_AGENTS: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Where agents connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Protocol version to request; `None` lets the server decide.
    pub version_hint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25565,
            version_hint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of `fleet.json` and `models/`.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
    pub agent: AgentConfig,
    pub learning: LearningConfig,
    pub storage: StorageConfig,
}

impl FleetConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FleetConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by [`CONFIG_ENV`], or the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let schedule = &self.schedule;
        if schedule.agent_count == 0 || schedule.agent_count > MAX_AGENTS {
            return Err(ConfigError::invalid(
                "schedule.agent_count",
                format!("{} is outside 1..={MAX_AGENTS}", schedule.agent_count),
            ));
        }
        if schedule.max_interval_secs < schedule.base_interval_secs {
            return Err(ConfigError::invalid(
                "schedule.max_interval_secs",
                format!(
                    "{} is below base_interval_secs {}",
                    schedule.max_interval_secs, schedule.base_interval_secs
                ),
            ));
        }

        if self.agent.tick_interval_ms == 0 {
            return Err(ConfigError::invalid("agent.tick_interval_ms", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.agent.stall_epsilon) {
            return Err(ConfigError::invalid("agent.stall_epsilon", "must lie in [0, 1]"));
        }

        let learning = &self.learning;
        if learning.batch_size == 0 || learning.batch_size > learning.replay_buffer_size {
            return Err(ConfigError::invalid(
                "learning.batch_size",
                format!(
                    "{} must be in 1..={} (replay_buffer_size)",
                    learning.batch_size, learning.replay_buffer_size
                ),
            ));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&learning.min_epsilon)
            || !unit.contains(&learning.initial_epsilon)
            || learning.min_epsilon > learning.initial_epsilon
        {
            return Err(ConfigError::invalid(
                "learning.initial_epsilon",
                format!(
                    "need 0 <= min_epsilon ({}) <= initial_epsilon ({}) <= 1",
                    learning.min_epsilon, learning.initial_epsilon
                ),
            ));
        }
        if learning.epsilon_decay.is_nan() || learning.epsilon_decay <= 0.0 || learning.epsilon_decay > 1.0 {
            return Err(ConfigError::invalid("learning.epsilon_decay", "must lie in (0, 1]"));
        }
        if !unit.contains(&learning.discount_factor) {
            return Err(ConfigError::invalid("learning.discount_factor", "must lie in [0, 1]"));
        }
        if learning.target_update_freq == 0 {
            return Err(ConfigError::invalid("learning.target_update_freq", "must be positive"));
        }
        if learning.learning_rate.is_nan() || learning.learning_rate <= 0.0 {
            return Err(ConfigError::invalid("learning.learning_rate", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::AgentMode;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let cfg = FleetConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.schedule.agent_count, 20);
        assert_eq!(cfg.server.port, 25565);
        assert_eq!(cfg.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fleet.json");
        fs::write(
            &path,
            r#"{"server":{"host":"mc.example.org"},"schedule":{"agent_count":3},"agent":{"mode":"timed"}}"#,
        )
        .unwrap();

        let cfg = FleetConfig::load(&path).unwrap();
        assert_eq!(cfg.server.host, "mc.example.org");
        assert_eq!(cfg.server.port, 25565);
        assert_eq!(cfg.schedule.agent_count, 3);
        assert_eq!(cfg.schedule.base_interval_secs, 300);
        assert_eq!(cfg.agent.mode, AgentMode::Timed);
        assert_eq!(cfg.learning.batch_size, 32);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = FleetConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"schedule\": [").unwrap();
        assert!(matches!(FleetConfig::load(&path).unwrap_err(), ConfigError::Parse { .. }));
    }

    fn rejected(mutate: impl FnOnce(&mut FleetConfig)) -> &'static str {
        let mut cfg = FleetConfig::default();
        mutate(&mut cfg);
        match cfg.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn validation_names_the_offending_field() {
        assert_eq!(rejected(|c| c.schedule.agent_count = 0), "schedule.agent_count");
        assert_eq!(rejected(|c| c.schedule.agent_count = 21), "schedule.agent_count");
        assert_eq!(rejected(|c| c.schedule.max_interval_secs = 10), "schedule.max_interval_secs");
        assert_eq!(rejected(|c| c.agent.tick_interval_ms = 0), "agent.tick_interval_ms");
        assert_eq!(rejected(|c| c.learning.batch_size = 0), "learning.batch_size");
        assert_eq!(
            rejected(|c| c.learning.batch_size = c.learning.replay_buffer_size + 1),
            "learning.batch_size"
        );
        assert_eq!(rejected(|c| c.learning.min_epsilon = 1.5), "learning.initial_epsilon");
        assert_eq!(
            rejected(|c| {
                c.learning.initial_epsilon = 0.1;
                c.learning.min_epsilon = 0.2;
            }),
            "learning.initial_epsilon"
        );
        assert_eq!(rejected(|c| c.learning.epsilon_decay = 0.0), "learning.epsilon_decay");
        assert_eq!(rejected(|c| c.learning.discount_factor = 1.2), "learning.discount_factor");
        assert_eq!(rejected(|c| c.learning.target_update_freq = 0), "learning.target_update_freq");
    }

    #[test]
    fn equal_bounds_are_allowed() {
        let mut cfg = FleetConfig::default();
        cfg.schedule.base_interval_secs = 300;
        cfg.schedule.max_interval_secs = 300;
        cfg.learning.epsilon_decay = 1.0;
        cfg.validate().unwrap();
    }
}
