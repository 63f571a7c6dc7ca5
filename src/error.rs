//! Error types for aifabrix-env

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for aifabrix-env operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for environment and secrets resolution
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize data: {0}")]
    Serialize(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Failed to load environment config '{path}': {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("Failed to read user environment config '{path}': {reason}")]
    UserConfigRead { path: PathBuf, reason: String },

    #[error("Invalid developer id '{0}': expected a non-negative integer")]
    InvalidDeveloperId(String),

    #[error("Application config not found: {}", .0.display())]
    VariablesFileNotFound(PathBuf),

    #[error("Env template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    // -------------------------------------------------------------------------
    // Secrets Errors
    // -------------------------------------------------------------------------
    #[error(
        "No secrets found. Create a secrets file at '{}' or '{}'",
        user_path.display(),
        build_path.display()
    )]
    EmptySecrets {
        user_path: PathBuf,
        build_path: PathBuf,
    },

    #[error("Missing secrets: {}", .0.join(", "))]
    MissingSecretReferences(Vec<String>),

    #[error(
        "Invalid encryption key: expected 64 hex characters or 44 base64 characters (32 bytes)"
    )]
    InvalidEncryptionKey,

    #[error(
        "Encrypted secrets found but no encryption key is configured (set 'secrets-encryption')"
    )]
    EncryptionKeyMissing,

    #[error("Decryption failed: invalid key or corrupted data")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Remote secrets source '{location}' failed: {reason}")]
    Remote { location: String, reason: String },

    // -------------------------------------------------------------------------
    // Output Errors
    // -------------------------------------------------------------------------
    #[error("Refusing to write env file into shared output directory: {}", .0.display())]
    ForbiddenOutputPath(PathBuf),
}

impl Error {
    /// Check if this is a "not found" type error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::VariablesFileNotFound(_) | Error::TemplateNotFound(_)
        )
    }

    /// Conditions the pipeline swallows and continues past with the best available data
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::UserConfigRead { .. } | Error::Remote { .. })
    }

    pub(crate) fn parse(path: &Path, reason: impl ToString) -> Self {
        Error::Parse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialize(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialize(e.to_string())
    }
}

// =============================================================================
// Filesystem Helper Functions
// =============================================================================
// These reduce repetitive map_err patterns across the loaders.

/// Read a file to string with proper error handling
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Create a directory (and parents) with proper error handling
pub fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })
}
