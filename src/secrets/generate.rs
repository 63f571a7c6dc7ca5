//! Synthesis of missing secret values from key-name conventions

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

// databases-<name>-<index>-passwordKeyVault / urlKeyVault (matched lowercased)
static DATABASE_PASSWORD_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^databases-(.+)-\d+-passwordkeyvault$").expect("static regex pattern is valid")
});
static DATABASE_URL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^databases-(.+)-\d+-urlkeyvault$").expect("static regex pattern is valid")
});

/// How a missing secret gets its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedKind {
    /// Fixed development password for a database
    DatabasePassword { database: String },
    /// Connection string templated on `${DB_HOST}` / `${DB_PORT}`
    DatabaseUrl { database: String },
    /// 32 random bytes, base64
    Random,
    /// No recognisable convention
    Empty,
}

/// Classify `key` by naming convention
#[must_use]
pub fn classify(key: &str) -> GeneratedKind {
    let lower = key.to_ascii_lowercase();

    if let Some(caps) = DATABASE_PASSWORD_KEY.captures(&lower) {
        return GeneratedKind::DatabasePassword {
            database: database_name(&caps[1]),
        };
    }
    if let Some(caps) = DATABASE_URL_KEY.captures(&lower) {
        return GeneratedKind::DatabaseUrl {
            database: database_name(&caps[1]),
        };
    }
    if lower.contains("password") {
        return GeneratedKind::Random;
    }
    if lower.contains("url") || lower.contains("uri") {
        return GeneratedKind::Empty;
    }
    if ["key", "secret", "token"].iter().any(|w| lower.contains(w)) {
        return GeneratedKind::Random;
    }
    GeneratedKind::Empty
}

fn database_name(raw: &str) -> String {
    raw.replace('-', "_")
}

/// Produce a value for a secret that is referenced but absent
#[must_use]
pub fn generate_secret(key: &str) -> String {
    match classify(key) {
        GeneratedKind::DatabasePassword { database } => format!("{database}_pass123"),
        GeneratedKind::DatabaseUrl { database } => format!(
            "postgresql://{database}_user:{database}_pass123@${{DB_HOST}}:${{DB_PORT}}/{database}"
        ),
        GeneratedKind::Random => random_secret(),
        GeneratedKind::Empty => String::new(),
    }
}

/// 32 random bytes, standard base64
#[must_use]
pub fn random_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_password_is_deterministic() {
        assert_eq!(
            generate_secret("databases-my-app-0-passwordKeyVault"),
            "my_app_pass123"
        );
        assert_eq!(
            generate_secret("databases-my-app-0-passwordKeyVault"),
            generate_secret("databases-my-app-0-passwordKeyVault")
        );
    }

    #[test]
    fn test_database_url_references_db_vars() {
        assert_eq!(
            generate_secret("databases-orders-1-urlKeyVault"),
            "postgresql://orders_user:orders_pass123@${DB_HOST}:${DB_PORT}/orders"
        );
    }

    #[test]
    fn test_random_for_sensitive_names() {
        for key in ["admin-password", "api-key", "jwt-secret", "refresh-token", "SESSION_KEY"] {
            assert_eq!(classify(key), GeneratedKind::Random, "{key}");
        }
        let value = generate_secret("api-key");
        assert_eq!(STANDARD.decode(&value).unwrap().len(), 32);
        assert_ne!(value, generate_secret("api-key"));
    }

    #[test]
    fn test_other_names_are_empty() {
        assert_eq!(generate_secret("feature-flag"), "");
        assert_eq!(generate_secret("callback-url"), "");
    }
}
