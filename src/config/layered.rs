//! Layered environment configuration
//!
//! A base document (bundled, or an explicit file) is merged with an optional
//! per-user override document. Top-level keys are shallow-merged; each
//! `environments.<context>` map is merged key-by-key.

use super::types::{Context, VarMap};
use crate::error::{read_file, Error, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Base layer shipped with the crate
pub const BUNDLED_ENV_CONFIG: &str = include_str!("env-config.yaml");

/// Per-context variable maps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environments {
    #[serde(default)]
    pub docker: VarMap,
    #[serde(default)]
    pub local: VarMap,
}

impl Environments {
    #[must_use]
    pub fn get(&self, context: Context) -> &VarMap {
        match context {
            Context::Docker => &self.docker,
            Context::Local => &self.local,
        }
    }

    pub fn get_mut(&mut self, context: Context) -> &mut VarMap {
        match context {
            Context::Docker => &mut self.docker,
            Context::Local => &mut self.local,
        }
    }

    /// Merge `overlay` into each context key-by-key
    pub fn merge_from(&mut self, overlay: &Environments) {
        self.docker.merge_from(&overlay.docker);
        self.local.merge_from(&overlay.local);
    }
}

/// The merged `env-config` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayeredConfig {
    #[serde(default)]
    pub environments: Environments,

    /// Any other top-level keys, carried through untouched
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl LayeredConfig {
    /// Parse a layered-config document
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialize` if the YAML is malformed.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(Error::from)
    }

    /// Apply a user layer over this one
    pub fn merge_user(&mut self, user: &LayeredConfig) {
        for (key, value) in &user.extra {
            self.extra.insert(key.clone(), value.clone());
        }
        self.environments.merge_from(&user.environments);
    }

    #[must_use]
    pub fn vars(&self, context: Context) -> &VarMap {
        self.environments.get(context)
    }
}

/// Where the base layer comes from
#[derive(Debug, Clone, Default)]
pub enum BaseDocument {
    /// The document compiled into the crate
    #[default]
    Bundled,
    /// A document on disk
    File(PathBuf),
}

/// Result of loading both layers
///
/// A broken user layer never fails the load; it is handed back so the caller
/// can decide how to report it.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: LayeredConfig,
    pub user_layer_error: Option<Error>,
}

/// Loads the base layer and merges the optional user override
#[derive(Debug, Clone, Default)]
pub struct ConfigLayerLoader {
    base: BaseDocument,
    user_override: Option<PathBuf>,
}

impl ConfigLayerLoader {
    /// Loader for the bundled base document with no user layer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a base document from disk instead of the bundled one
    #[must_use]
    pub fn base_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.base = BaseDocument::File(path.into());
        self
    }

    /// Set (or clear) the user override document
    #[must_use]
    pub fn user_override(mut self, path: Option<PathBuf>) -> Self {
        self.user_override = path;
        self
    }

    /// Load and merge; user-layer failures are silently dropped
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigLoad` if the base document is missing or unparsable.
    pub fn load(&self) -> Result<LayeredConfig> {
        self.load_layers().map(|loaded| loaded.config)
    }

    /// Load and merge, returning any recovered user-layer failure
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigLoad` if the base document is missing or unparsable.
    pub fn load_layers(&self) -> Result<LoadedConfig> {
        let mut config = self.load_base()?;

        let user_layer_error = match &self.user_override {
            Some(path) => match Self::load_user(path) {
                Ok(user) => {
                    config.merge_user(&user);
                    debug!("Merged user env config from {}", path.display());
                    None
                }
                Err(e) => Some(e),
            },
            None => None,
        };

        Ok(LoadedConfig {
            config,
            user_layer_error,
        })
    }

    fn load_base(&self) -> Result<LayeredConfig> {
        match &self.base {
            BaseDocument::Bundled => {
                LayeredConfig::from_yaml(BUNDLED_ENV_CONFIG).map_err(|e| Error::ConfigLoad {
                    path: PathBuf::from("<bundled env-config.yaml>"),
                    reason: e.to_string(),
                })
            }
            BaseDocument::File(path) => {
                let content = read_file(path).map_err(|e| Error::ConfigLoad {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                LayeredConfig::from_yaml(&content).map_err(|e| Error::ConfigLoad {
                    path: path.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn load_user(path: &Path) -> Result<LayeredConfig> {
        let to_user_error = |e: Error| Error::UserConfigRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let content = read_file(path).map_err(to_user_error)?;
        LayeredConfig::from_yaml(&content).map_err(to_user_error)
    }
}
