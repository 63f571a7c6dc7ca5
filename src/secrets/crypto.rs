//! `secure://` envelope encryption
//!
//! Envelope format: `secure://<iv>:<ciphertext>:<tag>`, each part standard
//! base64. AES-256-GCM with a 12-byte IV and a 16-byte authentication tag.

use crate::error::{Error, Result};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use std::fmt;

/// Prefix marking an encrypted secret value
pub const SECURE_PREFIX: &str = "secure://";

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Whether `value` carries the encrypted envelope
#[must_use]
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(SECURE_PREFIX)
}

/// A validated 256-bit key
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Parse a key given as 64 hex characters or 44 base64 characters
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEncryptionKey` unless the input decodes to
    /// exactly 32 bytes.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        let bytes = if raw.len() == KEY_LEN * 2 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            hex::decode(raw).map_err(|_| Error::InvalidEncryptionKey)?
        } else if raw.len() == 44 {
            STANDARD
                .decode(raw)
                .map_err(|_| Error::InvalidEncryptionKey)?
        } else {
            return Err(Error::InvalidEncryptionKey);
        };

        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidEncryptionKey)?;
        Ok(Self(key))
    }

    /// Generate a random key
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::rng().random())
    }

    /// Hex form, as written to `secrets-encryption`
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|_| Error::InvalidEncryptionKey)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Encrypt `plaintext` into a `secure://` envelope
///
/// # Errors
///
/// Returns `Error::EncryptionFailed` if the cipher rejects the input.
pub fn encrypt_value(plaintext: &str, key: &EncryptionKey) -> Result<String> {
    let iv: [u8; IV_LEN] = rand::rng().random();
    let sealed = key
        .cipher()?
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| Error::EncryptionFailed)?;

    // aes-gcm appends the tag to the ciphertext
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    Ok(format!(
        "{SECURE_PREFIX}{}:{}:{}",
        STANDARD.encode(iv),
        STANDARD.encode(ciphertext),
        STANDARD.encode(tag)
    ))
}

/// Decrypt a `secure://` envelope
///
/// Every failure (malformed envelope, wrong key, tampered data, non-UTF-8
/// plaintext) is reported as the same `Error::DecryptionFailed`.
///
/// # Errors
///
/// Returns `Error::DecryptionFailed` as described above.
pub fn decrypt_value(envelope: &str, key: &EncryptionKey) -> Result<String> {
    let body = envelope
        .strip_prefix(SECURE_PREFIX)
        .ok_or(Error::DecryptionFailed)?;

    let mut parts = body.split(':');
    let (Some(iv), Some(ciphertext), Some(tag), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::DecryptionFailed);
    };

    let decode = |part: &str| STANDARD.decode(part).map_err(|_| Error::DecryptionFailed);
    let iv = decode(iv)?;
    let mut sealed = decode(ciphertext)?;
    let tag = decode(tag)?;

    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(Error::DecryptionFailed);
    }
    sealed.extend_from_slice(&tag);

    let plaintext = key
        .cipher()?
        .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
        .map_err(|_| Error::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| Error::DecryptionFailed)
}
