//! Secrets sources

use super::SecretsMap;
use crate::error::{Error, Result};
use crate::storage::{self, StorageBackend};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Anything that can produce a flat secrets map
pub trait SecretsSource: Send + Sync {
    /// Load the current secrets
    ///
    /// # Errors
    ///
    /// Returns an error if the source exists but cannot be read or parsed.
    fn load(&self) -> Result<SecretsMap>;

    /// Human-readable location, used in logs and errors
    fn location(&self) -> String;
}

// =============================================================================
// File source
// =============================================================================

/// A YAML (or `.json`) secrets document; a missing file is an empty map
#[derive(Debug, Clone)]
pub struct FileSecretsSource {
    path: PathBuf,
}

impl FileSecretsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretsSource for FileSecretsSource {
    fn load(&self) -> Result<SecretsMap> {
        if !self.path.exists() {
            debug!("Secrets file {} not present", self.path.display());
            return Ok(SecretsMap::new());
        }
        let secrets: SecretsMap = storage::for_path(&self.path).read(&self.path)?;
        debug!(
            "Loaded {} secrets from {}",
            secrets.len(),
            self.path.display()
        );
        Ok(secrets)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// =============================================================================
// In-memory source
// =============================================================================

/// Fixed secrets held in memory, or a source that always fails
///
/// Stands in for the remote secrets collaborator in tests and embeddings.
#[derive(Debug, Clone)]
pub struct MemorySecretsSource {
    location: String,
    outcome: std::result::Result<SecretsMap, String>,
}

impl MemorySecretsSource {
    pub fn new(location: impl Into<String>, secrets: SecretsMap) -> Self {
        Self {
            location: location.into(),
            outcome: Ok(secrets),
        }
    }

    /// A source whose every load fails with `Error::Remote`
    pub fn unavailable(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            outcome: Err(reason.into()),
        }
    }
}

impl SecretsSource for MemorySecretsSource {
    fn load(&self) -> Result<SecretsMap> {
        self.outcome.clone().map_err(|reason| Error::Remote {
            location: self.location.clone(),
            reason,
        })
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

// =============================================================================
// Warn-once markers
// =============================================================================

fn warned() -> &'static Mutex<HashSet<String>> {
    static WARNED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    WARNED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Log `message` at warn level the first time `marker` is seen in this process
///
/// Returns whether the warning was emitted.
pub(crate) fn warn_once(marker: &str, message: impl FnOnce() -> String) -> bool {
    let first = warned()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(marker.to_string());
    if first {
        warn!("{}", message());
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let source = FileSecretsSource::new(dir.path().join("secrets.local.yaml"));
        assert!(source.load().unwrap().is_empty());
    }

    #[test]
    fn test_scalar_values_become_strings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.local.yaml");
        fs::write(&path, "api-key: abc\nport-number: 5432\nflag: true\nblank: ~\n").unwrap();

        let secrets = FileSecretsSource::new(&path).load().unwrap();
        assert_eq!(secrets.get("api-key"), Some("abc"));
        assert_eq!(secrets.get("port-number"), Some("5432"));
        assert_eq!(secrets.get("flag"), Some("true"));
        assert_eq!(secrets.get("blank"), Some(""));
    }

    #[test]
    fn test_unparsable_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.local.yaml");
        fs::write(&path, "key: [unterminated").unwrap();

        let err = FileSecretsSource::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Parse { path: p, .. } if p == path));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_secrets_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(&path, r#"{"api-key": "from-json"}"#).unwrap();

        let secrets = FileSecretsSource::new(&path).load().unwrap();
        assert_eq!(secrets.get("api-key"), Some("from-json"));
    }

    #[test]
    fn test_unavailable_source_is_recoverable() {
        let source = MemorySecretsSource::unavailable("https://vault.example", "timeout");
        let err = source.load().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(source.location(), "https://vault.example");
    }

    #[test]
    fn test_warn_once_per_marker() {
        let marker = "test-warn-once-marker";
        assert!(warn_once(marker, || "first".to_string()));
        assert!(!warn_once(marker, || "second".to_string()));
    }
}
