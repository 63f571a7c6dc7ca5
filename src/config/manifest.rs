//! Application manifest (`variables.yaml`)
//!
//! Only the fields that influence environment resolution are modelled; the
//! rest of the document is ignored.

use super::types::Context;
use crate::error::{Error, Result};
use crate::ports::Service;
use crate::storage::{self, StorageBackend};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest inside an application directory
pub const MANIFEST_FILE: &str = "variables.yaml";

/// File name of the env template inside an application directory
pub const TEMPLATE_FILE: &str = "env.template";

/// Default build-scoped secrets file inside an application directory
pub const BUILD_SECRETS_FILE: &str = "secrets.local.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSection {
    /// Port the app listens on when run outside containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_port: Option<u16>,

    /// Where `run` copies the generated `.env` (relative to the app dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_output_path: Option<String>,

    /// Build-scoped secrets file (relative to the app dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<String>,
}

/// Parsed `variables.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    #[serde(default)]
    pub app: AppSection,

    /// Container port of the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default)]
    pub build: BuildSection,
}

impl AppManifest {
    /// Load the manifest of `app_name` from `app_dir`
    ///
    /// # Errors
    ///
    /// Returns `Error::VariablesFileNotFound` if the file is absent, or
    /// `Error::Parse` if it is not a valid manifest.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(Error::VariablesFileNotFound(path));
        }
        storage::for_path(&path).read(&path)
    }

    /// Application port before any developer offset
    ///
    /// Local runs prefer `build.localPort` (when non-zero) over `port`.
    /// Without either, 3000 is used.
    #[must_use]
    pub fn base_app_port(&self, context: Context) -> u16 {
        let non_zero = |p: &Option<u16>| p.filter(|&p| p > 0);

        let configured = match context {
            Context::Local => non_zero(&self.build.local_port).or_else(|| non_zero(&self.port)),
            Context::Docker => non_zero(&self.port),
        };

        configured.unwrap_or_else(|| {
            let fallback = Service::App.base_port();
            warn!(
                "No application port configured for {} context; defaulting to {fallback}",
                context
            );
            fallback
        })
    }

    /// Build-scoped secrets file for this app
    #[must_use]
    pub fn build_secrets_path(&self, app_dir: &Path) -> PathBuf {
        match self.build.secrets.as_deref() {
            Some(rel) if !rel.trim().is_empty() => app_dir.join(rel),
            _ => app_dir.join(BUILD_SECRETS_FILE),
        }
    }

    /// Configured copy target for `.env`, if any
    #[must_use]
    pub fn env_output_path(&self, app_dir: &Path) -> Option<PathBuf> {
        self.build
            .env_output_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| app_dir.join(p))
    }
}

/// Read the env template from an application directory
///
/// # Errors
///
/// Returns `Error::TemplateNotFound` if `env.template` is absent.
pub fn load_template(app_dir: &Path) -> Result<String> {
    let path = app_dir.join(TEMPLATE_FILE);
    std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::TemplateNotFound(path.clone())
        } else {
            Error::FileRead {
                path: path.clone(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_local_port_preferred_in_local_context() {
        let manifest: AppManifest =
            serde_yaml::from_str("app:\n  key: demo\nport: 3077\nbuild:\n  localPort: 3087\n")
                .unwrap();

        assert_eq!(manifest.app.key.as_deref(), Some("demo"));
        assert_eq!(manifest.base_app_port(Context::Local), 3087);
        assert_eq!(manifest.base_app_port(Context::Docker), 3077);
    }

    #[test]
    fn test_zero_local_port_falls_back_to_port() {
        let manifest: AppManifest =
            serde_yaml::from_str("port: 4000\nbuild:\n  localPort: 0\n").unwrap();
        assert_eq!(manifest.base_app_port(Context::Local), 4000);
    }

    #[test]
    fn test_unset_ports_default_to_3000() {
        let manifest = AppManifest::default();
        assert_eq!(manifest.base_app_port(Context::Local), 3000);
        assert_eq!(manifest.base_app_port(Context::Docker), 3000);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let err = AppManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::VariablesFileNotFound(p) if p.ends_with(MANIFEST_FILE)));
    }

    #[test]
    fn test_secrets_path_override() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "build:\n  secrets: config/secrets.yaml\n  envOutputPath: ../app/.env\n",
        )
        .unwrap();

        let manifest = AppManifest::load(dir.path()).unwrap();
        assert_eq!(
            manifest.build_secrets_path(dir.path()),
            dir.path().join("config/secrets.yaml")
        );
        assert_eq!(
            manifest.env_output_path(dir.path()),
            Some(dir.path().join("../app/.env"))
        );
        assert_eq!(
            AppManifest::default().build_secrets_path(dir.path()),
            dir.path().join(BUILD_SECRETS_FILE)
        );
    }

    #[test]
    fn test_missing_template() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_template(dir.path()),
            Err(Error::TemplateNotFound(_))
        ));

        fs::write(dir.path().join(TEMPLATE_FILE), "PORT=3000\n").unwrap();
        assert_eq!(load_template(dir.path()).unwrap(), "PORT=3000\n");
    }
}
