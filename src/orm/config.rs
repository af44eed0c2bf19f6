//! AeroData Configuration Module
//! Handles loading and validating aerodata.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::orm::backend::{self, Backend};
use crate::orm::error::OrmResult;
use crate::orm::logging::LogFormat;
use crate::orm::relations::{RelationDef, RelationRegistry};

pub const CONFIG_FILE: &str = "aerodata.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub project: ProjectConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Relations added to (or overriding) the bundled aerospace ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

/// Which storage adapter to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Sqlite {
        connection_string: String,
    },
    Graph {
        uri: String,
        username: String,
        #[serde(default)]
        password: String,
    },
}

/// Logging section. Without a `level`, `RUST_LOG` decides, then `info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = project_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), ConfigError> {
        let config_path = project_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn default_for_project(name: &str) -> Self {
        Self {
            version: "0.1.0".to_string(),
            project: ProjectConfig {
                name: name.to_string(),
            },
            backend: BackendConfig::Sqlite {
                connection_string: "sqlite://data/aerodata.db".to_string(),
            },
            logging: LoggingConfig::default(),
            relations: Vec::new(),
        }
    }

    /// Bundled aerospace relations plus any declared in the config
    pub fn registry(&self) -> RelationRegistry {
        self.relations
            .iter()
            .cloned()
            .fold(RelationRegistry::aerospace(), RelationRegistry::with)
    }

    /// Build (without connecting) the configured backend. Relative paths
    /// resolve against `project_dir`.
    pub fn open_backend(&self, project_dir: &Path) -> OrmResult<Box<dyn Backend>> {
        backend::open_backend(&self.backend, project_dir, self.registry())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let config = Config::default_for_project("fleet");
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.name, "fleet");
        assert_eq!(loaded.backend, config.backend);
        assert_eq!(loaded.logging.level, None);

        let written = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(!written.contains("\"level\""));
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_graph_backend_and_extra_relations() {
        let json = r#"{
            "version": "0.1.0",
            "project": {"name": "graph"},
            "backend": {"type": "graph", "uri": "memory://", "username": "ops"},
            "relations": [
                {"source": "engine", "name": "aircraft", "target": "aircraft",
                 "kind": "has_many", "foreign_key": "engine_ids"}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Graph {
                uri: "memory://".into(),
                username: "ops".into(),
                password: String::new(),
            }
        );
        assert_eq!(config.logging.format, LogFormat::Pretty);

        let registry = config.registry();
        assert!(registry.is_relation("engine", "aircraft"));
        assert!(registry.is_relation("aircraft", "engines"));
    }
}
