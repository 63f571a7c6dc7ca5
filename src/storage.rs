//! Storage backend trait and implementations
//!
//! Config, manifest and secrets documents are YAML by default; JSON documents
//! are accepted when the file extension says so.

use crate::error::{read_file, Error, Result};
use crate::security::write_secure_file;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Trait for document format implementations
pub trait StorageBackend: Clone + Send + Sync {
    /// File extension for this storage format (e.g., "yaml", "json")
    fn extension(&self) -> &str;

    /// Serialize data to string
    fn serialize<T: Serialize>(&self, data: &T) -> Result<String>;

    /// Deserialize data from string
    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T>;

    /// Read and deserialize from file
    ///
    /// Parse failures are reported against the file path.
    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = read_file(path)?;
        self.deserialize(&content).map_err(|e| match e {
            Error::Serialize(reason) => Error::parse(path, reason),
            other => other,
        })
    }

    /// Serialize and write to file with owner-only permissions
    fn write<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let content = self.serialize(data)?;
        write_secure_file(path, &content)
    }
}

// =============================================================================
// YAML Storage Implementation
// =============================================================================

/// YAML storage backend (default)
#[derive(Clone, Default)]
pub struct YamlStorage;

impl YamlStorage {
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for YamlStorage {
    fn extension(&self) -> &str {
        "yaml"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        serde_yaml::to_string(data).map_err(Error::from)
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        // An empty document is an empty mapping, not an error
        if content.trim().is_empty() {
            return serde_yaml::from_str("{}").map_err(Error::from);
        }
        serde_yaml::from_str(content).map_err(Error::from)
    }
}

// =============================================================================
// JSON Storage Implementation
// =============================================================================

/// JSON storage backend
#[cfg(feature = "json")]
#[derive(Clone)]
pub struct JsonStorage {
    pretty: bool,
}

#[cfg(feature = "json")]
impl JsonStorage {
    /// Create a new JSON storage backend with pretty printing enabled
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Create a JSON storage backend writing single-line documents
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

#[cfg(feature = "json")]
impl Default for JsonStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "json")]
impl StorageBackend for JsonStorage {
    fn extension(&self) -> &str {
        "json"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(data).map_err(Error::from)
        } else {
            serde_json::to_string(data).map_err(Error::from)
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_json::from_str(content).map_err(Error::from)
    }
}

// =============================================================================
// Format selection
// =============================================================================

/// Storage chosen from a document's file extension
#[derive(Clone)]
pub enum DocumentStorage {
    Yaml(YamlStorage),
    #[cfg(feature = "json")]
    Json(JsonStorage),
}

/// Pick the storage backend for `path` (`.json` → JSON, anything else → YAML)
pub fn for_path(path: &Path) -> DocumentStorage {
    match path.extension().and_then(|e| e.to_str()) {
        #[cfg(feature = "json")]
        Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentStorage::Json(JsonStorage::new()),
        _ => DocumentStorage::Yaml(YamlStorage::new()),
    }
}

impl StorageBackend for DocumentStorage {
    fn extension(&self) -> &str {
        match self {
            DocumentStorage::Yaml(s) => s.extension(),
            #[cfg(feature = "json")]
            DocumentStorage::Json(s) => s.extension(),
        }
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        match self {
            DocumentStorage::Yaml(s) => s.serialize(data),
            #[cfg(feature = "json")]
            DocumentStorage::Json(s) => s.serialize(data),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        match self {
            DocumentStorage::Yaml(s) => s.deserialize(content),
            #[cfg(feature = "json")]
            DocumentStorage::Json(s) => s.deserialize(content),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tempfile::tempdir;

    #[test]
    fn test_yaml_preserves_key_order() {
        let storage = YamlStorage::new();
        let parsed: IndexMap<String, String> = storage
            .deserialize("zeta: '1'\nalpha: '2'\nmid: '3'\n")
            .unwrap();

        let keys: Vec<_> = parsed.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_yaml_empty_document_is_empty_map() {
        let storage = YamlStorage::new();
        let parsed: IndexMap<String, String> = storage.deserialize("   \n").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_read_reports_path_on_parse_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "key: [unclosed").unwrap();

        let result: Result<IndexMap<String, String>> = YamlStorage::new().read(&path);
        match result {
            Err(Error::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_default_matches_new() {
        let data: IndexMap<&str, &str> = [("a", "1"), ("b", "2")].into_iter().collect();

        let default = JsonStorage::default().serialize(&data).unwrap();
        assert_eq!(default, JsonStorage::new().serialize(&data).unwrap());
        assert!(default.contains('\n'));
        assert_eq!(
            JsonStorage::compact().serialize(&data).unwrap(),
            r#"{"a":"1","b":"2"}"#
        );
    }

    #[test]
    fn test_read_nonexistent_file() {
        let result: Result<IndexMap<String, String>> =
            YamlStorage::new().read(Path::new("/nonexistent/file.yaml"));
        assert!(matches!(result.unwrap_err(), Error::FileRead { .. }));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_for_path_selects_by_extension() {
        assert_eq!(for_path(Path::new("secrets.json")).extension(), "json");
        assert_eq!(for_path(Path::new("secrets.local.yaml")).extension(), "yaml");
        assert_eq!(for_path(Path::new("secrets")).extension(), "yaml");
    }
}
