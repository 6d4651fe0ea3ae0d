//! TOML configuration.
//!
//! Every field has a default, so an empty or missing file is a valid
//! configuration. The default location is `<config_dir>/docintake/config.toml`.

use crate::intake::classify::{default_categories, Category, Taxonomy, TaxonomyError};
use crate::intake::gatekeeper::{Gatekeeper, DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_UPLOAD_BYTES};
use directories::ProjectDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid classifier taxonomy: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub intake: IntakeConfig,
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Requests running longer than this are answered with 408.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct IntakeConfig {
    /// Largest accepted upload; a file of exactly this size is accepted.
    pub max_upload_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StorageConfig {
    /// Holds `documents.db` and the `blobs/` tree. `~` is expanded.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().display().to_string())
            .unwrap_or_else(|| "~/.docintake".to_string());
        Self { data_dir }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Ordered; on equal scores the earlier category wins.
    pub categories: Vec<Category>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "docintake")
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from the default location when it exists.
    /// An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    tracing::debug!("no config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intake.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "intake.max_upload_bytes must be greater than zero".into(),
            ));
        }
        if self.intake.allowed_types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "intake.allowed_types must list at least one MIME type".into(),
            ));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.data_dir must not be empty".into()));
        }
        self.taxonomy()?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn gatekeeper(&self) -> Gatekeeper {
        Gatekeeper::new(
            self.intake
                .allowed_types
                .iter()
                .filter(|t| !t.trim().is_empty()),
            self.intake.max_upload_bytes,
        )
    }

    pub fn taxonomy(&self) -> Result<Taxonomy, TaxonomyError> {
        Taxonomy::new(self.classifier.categories.clone())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.data_dir).to_string())
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir().join("blobs")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    /// Override host and port from a `HOST:PORT` address.
    pub fn set_bind_addr(&mut self, addr: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::Invalid(format!("bind address must be HOST:PORT, got {addr:?}"));
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        self.gateway.port = port.parse().map_err(|_| invalid())?;
        self.gateway.host = host.to_string();
        Ok(())
    }

    /// JSON Schema describing the config file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }
}
