//! CLI defaults read from `<config dir>/cql2pg/config.toml`.

use crate::error::{CqlError, CqlResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Defaults for the command line tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `table` or `table.column` to compile against.
    pub field: Option<String>,

    /// Path to the JSON schema document.
    pub schema: Option<PathBuf>,

    /// Indexes searched by bare terms.
    pub server_choice: Vec<String>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_toml(content: &str) -> CqlResult<Self> {
        toml::from_str(content).map_err(|e| CqlError::config(e.to_string()))
    }

    /// Location of the user config file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cql2pg").join("config.toml"))
    }

    /// Load `path`, a missing file gives the empty config.
    pub fn load(path: impl AsRef<Path>) -> CqlResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("no config at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the user config file.
    pub fn load_default() -> CqlResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply command line overrides on top of the file values.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            field: overrides.field.or(self.field),
            schema: overrides.schema.or(self.schema),
            server_choice: if overrides.server_choice.is_empty() {
                self.server_choice
            } else {
                overrides.server_choice
            },
        }
    }
}

/// Builder for [`Config`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.config.field = Some(field.into());
        self
    }

    pub fn schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.schema = Some(path.into());
        self
    }

    pub fn server_choice<I, S>(mut self, indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.server_choice = indexes.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
