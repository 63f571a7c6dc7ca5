//! Secrets assembly
//!
//! Builds the effective secrets map for one application:
//! 1. build-scoped file, overridden by the user file
//! 2. canonical and remote sources as gap-fillers only
//! 3. `secure://` decryption
//! 4. optional generation of referenced-but-missing keys
//!
//! An empty result is an error naming where secrets were expected.

pub mod crypto;
pub mod generate;
pub mod source;

pub use crypto::{EncryptionKey, SECURE_PREFIX, decrypt_value, encrypt_value, is_encrypted};
pub use generate::{GeneratedKind, classify, generate_secret};
pub use source::{FileSecretsSource, MemorySecretsSource, SecretsSource};

use crate::config::VarValue;
use crate::error::{Error, Result};
use crate::storage::{self, StorageBackend};
use crate::template::secret_references;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Flat mapping of secret key to value
///
/// Values are kept as strings; numbers and booleans in the source document
/// are stringified and `null` becomes the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SecretsMap(IndexMap<String, String>);

impl SecretsMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Keys whose value is still a `secure://` envelope
    pub fn encrypted_keys(&self) -> impl Iterator<Item = &String> {
        self.0
            .iter()
            .filter(|(_, v)| is_encrypted(v))
            .map(|(k, _)| k)
    }

    /// Last-writer-wins merge: every key of `overlay` replaces ours
    pub fn override_with(&mut self, overlay: &SecretsMap) {
        for (key, value) in overlay.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Fallback merge that never clobbers plaintext
    ///
    /// A key is taken from `fallback` only when ours is missing or empty, or
    /// when ours is still encrypted and the fallback value is plaintext.
    /// Returns the number of keys taken.
    pub fn fill_from(&mut self, fallback: &SecretsMap) -> usize {
        let mut taken = 0;
        for (key, candidate) in fallback.iter() {
            let take = match self.0.get(key) {
                None => true,
                Some(current) if current.is_empty() => !candidate.is_empty(),
                Some(current) if is_encrypted(current) => {
                    !candidate.is_empty() && !is_encrypted(candidate)
                }
                Some(_) => false,
            };
            if take {
                self.0.insert(key.clone(), candidate.clone());
                taken += 1;
            }
        }
        taken
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretsMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for SecretsMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = IndexMap::<String, Option<VarValue>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(k, v)| (k, v.map(|v| v.to_string()).unwrap_or_default()))
            .collect())
    }
}

/// Outcome of [`SecretsStore::assemble`]
#[derive(Debug, Clone, Default)]
pub struct AssembledSecrets {
    pub secrets: SecretsMap,
    /// Keys synthesized by forced generation, in template order
    pub generated: Vec<String>,
    /// Where generated keys were persisted
    pub persisted_to: Option<PathBuf>,
}

/// Loads, merges, decrypts and completes the secrets for one application
pub struct SecretsStore {
    user_path: PathBuf,
    build_path: PathBuf,
    canonical: Option<Arc<dyn SecretsSource>>,
    remote: Option<Arc<dyn SecretsSource>>,
    encryption_key: Option<String>,
}

impl SecretsStore {
    /// Store over the user-scoped and build-scoped secrets files
    pub fn new(user_path: impl Into<PathBuf>, build_path: impl Into<PathBuf>) -> Self {
        Self {
            user_path: user_path.into(),
            build_path: build_path.into(),
            canonical: None,
            remote: None,
            encryption_key: None,
        }
    }

    /// Shared canonical secrets used to fill gaps
    #[must_use]
    pub fn with_canonical(mut self, source: Arc<dyn SecretsSource>) -> Self {
        self.canonical = Some(source);
        self
    }

    /// Remote secrets collaborator, also a gap-filler only
    #[must_use]
    pub fn with_remote(mut self, source: Arc<dyn SecretsSource>) -> Self {
        self.remote = Some(source);
        self
    }

    /// Raw `secrets-encryption` value (64 hex or 44 base64 characters)
    #[must_use]
    pub fn with_encryption_key(mut self, key: Option<String>) -> Self {
        self.encryption_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    #[must_use]
    pub fn user_path(&self) -> &Path {
        &self.user_path
    }

    #[must_use]
    pub fn build_path(&self) -> &Path {
        &self.build_path
    }

    /// Assemble the effective secrets map
    ///
    /// `explicit_path` replaces the user secrets file. With `force_generate`,
    /// keys referenced by `template` but absent are synthesized and written
    /// back to the user secrets file.
    ///
    /// # Errors
    ///
    /// - `Error::EncryptionKeyMissing` / `Error::InvalidEncryptionKey` when
    ///   encrypted values are present without a usable key
    /// - `Error::DecryptionFailed` when an envelope does not decrypt
    /// - `Error::EmptySecrets` when nothing was found
    /// - I/O and parse errors from the user or build files
    pub fn assemble(
        &self,
        explicit_path: Option<&Path>,
        template: &str,
        force_generate: bool,
    ) -> Result<AssembledSecrets> {
        let user_path = explicit_path.unwrap_or(self.user_path.as_path());

        let mut secrets = FileSecretsSource::new(&self.build_path).load()?;
        secrets.override_with(&FileSecretsSource::new(user_path).load()?);

        if let Some(canonical) = &self.canonical {
            match canonical.load() {
                Ok(fallback) => {
                    let taken = secrets.fill_from(&fallback);
                    debug!("Took {taken} secrets from {}", canonical.location());
                }
                Err(e) => warn!("Skipping canonical secrets: {e}"),
            }
        }

        if let Some(remote) = &self.remote {
            match remote.load() {
                Ok(fallback) => {
                    let taken = secrets.fill_from(&fallback);
                    debug!("Took {taken} secrets from {}", remote.location());
                }
                Err(e) => {
                    let location = remote.location();
                    source::warn_once(&location, || format!("Skipping remote secrets: {e}"));
                }
            }
        }

        self.decrypt_all(&mut secrets)?;

        let mut assembled = AssembledSecrets::default();
        if force_generate {
            assembled.generated = generate_missing(&mut secrets, template);
            if !assembled.generated.is_empty() {
                persist_generated(user_path, &secrets, &assembled.generated)?;
                info!(
                    "Generated {} missing secrets into {}",
                    assembled.generated.len(),
                    user_path.display()
                );
                assembled.persisted_to = Some(user_path.to_path_buf());
            }
        }

        if secrets.is_empty() {
            return Err(Error::EmptySecrets {
                user_path: user_path.to_path_buf(),
                build_path: self.build_path.clone(),
            });
        }

        assembled.secrets = secrets;
        Ok(assembled)
    }

    fn decrypt_all(&self, secrets: &mut SecretsMap) -> Result<()> {
        let encrypted: Vec<String> = secrets.encrypted_keys().cloned().collect();
        if encrypted.is_empty() {
            return Ok(());
        }

        let key = self.key()?;
        for name in &encrypted {
            if let Some(envelope) = secrets.get(name) {
                let plaintext = decrypt_value(envelope, &key)?;
                secrets.insert(name.clone(), plaintext);
            }
        }
        debug!("Decrypted {} secrets", encrypted.len());
        Ok(())
    }

    fn key(&self) -> Result<EncryptionKey> {
        let raw = self
            .encryption_key
            .as_deref()
            .ok_or(Error::EncryptionKeyMissing)?;
        EncryptionKey::parse(raw)
    }

    /// Encrypt `value` into a `secure://` envelope with the configured key
    ///
    /// # Errors
    ///
    /// Returns `Error::EncryptionKeyMissing` or `Error::InvalidEncryptionKey`
    /// without a usable key.
    pub fn seal(&self, value: &str) -> Result<String> {
        encrypt_value(value, &self.key()?)
    }
}

fn generate_missing(secrets: &mut SecretsMap, template: &str) -> Vec<String> {
    let mut generated = Vec::new();
    for key in secret_references(template) {
        if !secrets.contains_key(&key) {
            secrets.insert(key.clone(), generate_secret(&key));
            generated.push(key);
        }
    }
    generated
}

fn persist_generated(path: &Path, secrets: &SecretsMap, generated: &[String]) -> Result<()> {
    let mut on_disk = FileSecretsSource::new(path).load()?;
    for key in generated {
        if let Some(value) = secrets.get(key) {
            on_disk.insert(key.clone(), value);
        }
    }
    storage::for_path(path).write(path, &on_disk)
}
