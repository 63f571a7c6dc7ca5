//! Core configuration types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Execution context variables are resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// Containers reach each other by service DNS name
    Docker,
    /// Processes run directly on the developer machine
    Local,
}

impl Context {
    /// Whether the developer offset is applied to ports in this context
    ///
    /// Docker keeps in-container ports fixed and exposes the offset through
    /// `*_PUBLIC_PORT` companions instead.
    #[must_use]
    pub fn applies_developer_offset(self) -> bool {
        matches!(self, Context::Local)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Context::Docker => "docker",
            Context::Local => "local",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Context::Docker),
            "local" => Ok(Context::Local),
            other => Err(format!("unknown context '{other}' (expected docker or local)")),
        }
    }
}

// =============================================================================
// Variable values
// =============================================================================

/// A scalar value in a variable map (string or number in the YAML source)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl VarValue {
    /// Integer view of the value, accepting numeric strings
    #[must_use]
    pub fn as_port(&self) -> Option<u16> {
        match self {
            VarValue::Int(n) => u16::try_from(*n).ok(),
            VarValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, VarValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarValue::Bool(b) => write!(f, "{b}"),
            VarValue::Int(n) => write!(f, "{n}"),
            VarValue::Float(n) => write!(f, "{n}"),
            VarValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for VarValue {
    fn from(s: &str) -> Self {
        VarValue::Text(s.to_string())
    }
}

impl From<String> for VarValue {
    fn from(s: String) -> Self {
        VarValue::Text(s)
    }
}

impl From<u16> for VarValue {
    fn from(n: u16) -> Self {
        VarValue::Int(i64::from(n))
    }
}

impl From<i64> for VarValue {
    fn from(n: i64) -> Self {
        VarValue::Int(n)
    }
}

// =============================================================================
// Variable map
// =============================================================================

/// Ordered mapping of variable name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarMap(IndexMap<String, VarValue>);

impl VarMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&VarValue> {
        self.0.get(key)
    }

    /// String form of a value, `None` when absent
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).map(ToString::to_string)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<VarValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<VarValue> {
        self.0.shift_remove(key)
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

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Key-by-key merge: keys in `overlay` replace ours, the rest are kept
    pub fn merge_from(&mut self, overlay: &VarMap) {
        for (key, value) in overlay.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Flatten into `name → string` for interpolation lookups
    #[must_use]
    pub fn to_string_map(&self) -> HashMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<VarValue>> FromIterator<(K, V)> for VarMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Environment source
// =============================================================================

/// Source of process environment variables
///
/// Injected so that developer-id and home overrides can be exercised without
/// mutating the real process environment.
pub trait EnvSource: Send + Sync {
    /// Look up a variable, mirroring `std::env::var`
    fn var(&self, key: &str) -> std::result::Result<String, std::env::VarError>;
}

/// Reads from the real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEnvSource;

impl EnvSource for DefaultEnvSource {
    fn var(&self, key: &str) -> std::result::Result<String, std::env::VarError> {
        std::env::var(key)
    }
}

/// Fixed set of variables, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource(HashMap<String, String>);

impl MapEnvSource {
    pub fn new<K: Into<String>, V: Into<String>>(vars: impl IntoIterator<Item = (K, V)>) -> Self {
        Self(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl EnvSource for MapEnvSource {
    fn var(&self, key: &str) -> std::result::Result<String, std::env::VarError> {
        self.0.get(key).cloned().ok_or(std::env::VarError::NotPresent)
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(path.strip_prefix("~").unwrap_or(&path));
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_parse() {
        assert_eq!("docker".parse::<Context>().unwrap(), Context::Docker);
        assert_eq!(" LOCAL ".parse::<Context>().unwrap(), Context::Local);
        assert!("staging".parse::<Context>().is_err());
    }

    #[test]
    fn test_var_value_untagged() {
        let map: VarMap = serde_yaml::from_str("A: 5432\nB: 'postgres:5432'\nC: true\n").unwrap();
        assert_eq!(map.get("A"), Some(&VarValue::Int(5432)));
        assert_eq!(map.get_str("B").as_deref(), Some("postgres:5432"));
        assert_eq!(map.get_str("C").as_deref(), Some("true"));
    }

    #[test]
    fn test_as_port_accepts_numeric_strings() {
        assert_eq!(VarValue::from("6379").as_port(), Some(6379));
        assert_eq!(VarValue::Int(70000).as_port(), None);
        assert_eq!(VarValue::from("redis").as_port(), None);
    }

    #[test]
    fn test_merge_from_overrides_key_by_key() {
        let mut base: VarMap = [("DB_HOST", "postgres"), ("REDIS_HOST", "redis")]
            .into_iter()
            .collect();
        let overlay: VarMap = [("DB_HOST", "db.internal")].into_iter().collect();

        base.merge_from(&overlay);

        assert_eq!(base.get_str("DB_HOST").as_deref(), Some("db.internal"));
        assert_eq!(base.get_str("REDIS_HOST").as_deref(), Some("redis"));
        assert_eq!(base.keys().next().map(String::as_str), Some("DB_HOST"));
    }

    #[test]
    fn test_map_env_source() {
        let env = MapEnvSource::new([("AIFABRIX_DEVELOPERID", "3")]);
        assert_eq!(env.var("AIFABRIX_DEVELOPERID").unwrap(), "3");
        assert!(env.var("MISSING").is_err());
    }
}
