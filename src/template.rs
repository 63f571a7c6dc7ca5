//! Template interpolation
//!
//! Two token families are substituted on every line that is not blank or a
//! comment:
//! - `kv://<key>` is replaced by the secret value, whose own `${VAR}` tokens
//!   are resolved once against the variable map
//! - `${VAR}` is replaced by the variable, or left as-is when unknown
//!
//! Each token is replaced exactly once; substituted text is never rescanned.

use crate::config::VarMap;
use crate::dotenv::{EnvDocument, EnvLine};
use crate::secrets::SecretsMap;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Scheme of a secret reference
pub const KV_SCHEME: &str = "kv://";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"kv://([A-Za-z0-9_-]+)|\$\{([A-Za-z0-9_-]+)\}")
        .expect("static regex pattern is valid")
});
static VAR_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_-]+)\}").expect("static regex pattern is valid")
});
static KV_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"kv://([A-Za-z0-9_-]+)").expect("static regex pattern is valid")
});

/// Substitutes secret references and variables in template text
pub struct TemplateInterpolator<'a> {
    secrets: &'a SecretsMap,
    vars: &'a VarMap,
}

impl<'a> TemplateInterpolator<'a> {
    pub fn new(secrets: &'a SecretsMap, vars: &'a VarMap) -> Self {
        Self { secrets, vars }
    }

    /// Resolve every token in `template`
    #[must_use]
    pub fn interpolate(&self, template: &str) -> String {
        let mut doc = EnvDocument::parse(template);
        for line in doc.lines_mut() {
            match line {
                EnvLine::Assignment { value, .. } => *value = self.substitute(value),
                EnvLine::Other(raw) => *raw = self.substitute(raw),
                EnvLine::Blank(_) | EnvLine::Comment(_) => {}
            }
        }
        doc.to_string()
    }

    fn substitute(&self, text: &str) -> String {
        TOKEN
            .replace_all(text, |caps: &Captures| {
                if let Some(key) = caps.get(1) {
                    match self.secrets.get(key.as_str()) {
                        Some(secret) => resolve_vars(secret, self.vars),
                        None => caps[0].to_string(),
                    }
                } else {
                    self.vars
                        .get_str(&caps[2])
                        .unwrap_or_else(|| caps[0].to_string())
                }
            })
            .into_owned()
    }
}

/// One-level `${VAR}` substitution; unknown variables stay literal
#[must_use]
pub fn resolve_vars(text: &str, vars: &VarMap) -> String {
    VAR_TOKEN
        .replace_all(text, |caps: &Captures| {
            vars.get_str(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Secret keys referenced by `template`, deduplicated in first-seen order
#[must_use]
pub fn secret_references(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    for line in template.lines().map(EnvLine::parse) {
        let Some(text) = line.scannable_text() else {
            continue;
        };
        for caps in KV_TOKEN.captures_iter(text) {
            let key = caps[1].to_string();
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }

    keys
}

/// Every `kv://<key>` in `template` with no entry in `secrets`
///
/// Entries are formatted as `kv://<key>`, deduplicated in first-seen order.
#[must_use]
pub fn collect_missing(template: &str, secrets: &SecretsMap) -> Vec<String> {
    secret_references(template)
        .into_iter()
        .filter(|key| !secrets.contains_key(key))
        .map(|key| format!("{KV_SCHEME}{key}"))
        .collect()
}
