//! User configuration provider
//!
//! All reads of the aifabrix `config.yaml` go through a [`ConfigProvider`],
//! loaded once and cached for the life of the provider. Components receive the
//! provider (or values taken from it) instead of reading the file themselves.

use super::layered::Environments;
use super::types::{expand_home, Context, DefaultEnvSource, EnvSource, VarMap};
use crate::error::Result;
use crate::ports::DeveloperId;
use crate::storage::{StorageBackend, YamlStorage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Environment variable with the highest priority for the developer id
pub const DEVELOPER_ID_ENV: &str = "AIFABRIX_DEVELOPERID";

/// Environment variable overriding the aifabrix home directory
pub const HOME_ENV: &str = "AIFABRIX_HOME";

/// Developer id as written in config (integer or numeric string)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDeveloperId {
    Int(i64),
    Text(String),
}

impl RawDeveloperId {
    fn to_developer_id(&self) -> DeveloperId {
        match self {
            RawDeveloperId::Int(n) => DeveloperId::parse_lenient(&n.to_string()),
            RawDeveloperId::Text(s) => DeveloperId::parse_lenient(s),
        }
    }
}

/// Contents of the user-level `config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_id: Option<RawDeveloperId>,

    /// Hostname used instead of literal `localhost` in local context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aifabrix_localhost: Option<String>,

    /// CLI-local override layer merged over the layered config
    #[serde(default)]
    pub environments: Environments,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aifabrix_home: Option<String>,

    /// Canonical (shared) secrets file used as a fallback source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aifabrix_secrets: Option<String>,

    /// User env-config document merged over the bundled base layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aifabrix_env_config: Option<String>,

    /// AES-256 key for `secure://` values (64 hex or 44 base64 chars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_encryption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_dir: Option<String>,
}

impl UserConfig {
    /// Non-empty localhost alias, if configured
    #[must_use]
    pub fn localhost_alias(&self) -> Option<&str> {
        self.aifabrix_localhost
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn environment_overrides(&self, context: Context) -> &VarMap {
        self.environments.get(context)
    }
}

/// Filesystem locations derived from the user configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AifabrixPaths {
    pub home: PathBuf,
    pub user_secrets: PathBuf,
    pub canonical_secrets: Option<PathBuf>,
    pub env_config_override: Option<PathBuf>,
    pub builder_dir: PathBuf,
}

impl AifabrixPaths {
    /// Directory holding an application's manifest, template and build secrets
    #[must_use]
    pub fn app_dir(&self, app_name: &str) -> PathBuf {
        self.builder_dir.join(app_name)
    }
}

/// Access to the user configuration with an explicit load/reload contract
pub trait ConfigProvider: Send + Sync {
    /// Return the configuration, reading it on first use
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn load(&self) -> Result<Arc<UserConfig>>;

    /// Discard any cached configuration and read it again
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    fn reload(&self) -> Result<Arc<UserConfig>>;

    /// Default aifabrix home when the config does not set `aifabrix-home`
    fn home_dir(&self) -> PathBuf;

    /// Process environment lookups
    fn env_source(&self) -> &dyn EnvSource;

    /// Developer id: `AIFABRIX_DEVELOPERID` first, then `developer-id`, else 0
    ///
    /// Malformed values fall back to 0 rather than failing.
    ///
    /// # Errors
    ///
    /// Returns an error only if the config itself cannot be loaded.
    fn developer_id(&self) -> Result<DeveloperId> {
        if let Ok(raw) = self.env_source().var(DEVELOPER_ID_ENV) {
            if !raw.trim().is_empty() {
                return Ok(DeveloperId::parse_lenient(&raw));
            }
        }

        let config = self.load()?;
        Ok(config
            .developer_id
            .as_ref()
            .map_or(DeveloperId::CANONICAL, RawDeveloperId::to_developer_id))
    }

    /// Resolve all configured paths
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    fn paths(&self) -> Result<AifabrixPaths> {
        let config = self.load()?;
        let home = config
            .aifabrix_home
            .as_deref()
            .map_or_else(|| self.home_dir(), expand_home);

        Ok(AifabrixPaths {
            user_secrets: home.join("secrets.local.yaml"),
            canonical_secrets: config.aifabrix_secrets.as_deref().map(expand_home),
            env_config_override: config.aifabrix_env_config.as_deref().map(expand_home),
            builder_dir: config
                .builder_dir
                .as_deref()
                .map_or_else(|| PathBuf::from("builder"), expand_home),
            home,
        })
    }
}

// =============================================================================
// File-backed provider
// =============================================================================

/// Reads `<home>/config.yaml`, caching it until [`ConfigProvider::reload`]
pub struct FileConfigProvider {
    home: PathBuf,
    config_path: PathBuf,
    env: Arc<dyn EnvSource>,
    cache: RwLock<Option<Arc<UserConfig>>>,
}

impl FileConfigProvider {
    /// Provider rooted at `home` (config file `<home>/config.yaml`)
    pub fn new(home: impl Into<PathBuf>, env: Arc<dyn EnvSource>) -> Self {
        let home = home.into();
        Self {
            config_path: home.join("config.yaml"),
            home,
            env,
            cache: RwLock::new(None),
        }
    }

    /// Locate the home directory from `AIFABRIX_HOME` or `~/.aifabrix`
    pub fn discover(env: Arc<dyn EnvSource>) -> Self {
        let home = env
            .var(HOME_ENV)
            .ok()
            .filter(|h| !h.trim().is_empty())
            .map(|h| expand_home(&h))
            .or_else(|| dirs::home_dir().map(|h| h.join(".aifabrix")))
            .unwrap_or_else(|| PathBuf::from(".aifabrix"));
        Self::new(home, env)
    }

    /// Provider for the real process environment
    pub fn from_process_env() -> Self {
        Self::discover(Arc::new(DefaultEnvSource))
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn read_config(&self) -> Result<UserConfig> {
        if !self.config_path.exists() {
            debug!(
                "No user config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(UserConfig::default());
        }
        YamlStorage::new().read(&self.config_path)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<Arc<UserConfig>> {
        if let Some(config) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(config));
        }
        self.reload()
    }

    fn reload(&self) -> Result<Arc<UserConfig>> {
        let config = Arc::new(self.read_config()?);
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&config));
        Ok(config)
    }

    fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }

    fn env_source(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }
}

// =============================================================================
// Static provider
// =============================================================================

/// In-memory configuration, for tests and embedding
pub struct StaticConfigProvider {
    config: Arc<UserConfig>,
    home: PathBuf,
    env: Arc<dyn EnvSource>,
}

impl StaticConfigProvider {
    pub fn new(config: UserConfig, home: impl Into<PathBuf>, env: Arc<dyn EnvSource>) -> Self {
        Self {
            config: Arc::new(config),
            home: home.into(),
            env,
        }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn load(&self) -> Result<Arc<UserConfig>> {
        Ok(Arc::clone(&self.config))
    }

    fn reload(&self) -> Result<Arc<UserConfig>> {
        self.load()
    }

    fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }

    fn env_source(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }
}
