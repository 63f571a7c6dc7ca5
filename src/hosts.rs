//! Infrastructure host and port resolution
//!
//! Turns the merged layered config into concrete endpoints for a context and
//! developer slot, and builds the variable map used for `${VAR}` substitution.

use crate::config::{Context, Environments, LayeredConfig, VarMap, VarValue};
use crate::ports::{DeveloperId, Service};
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

const LOCALHOST: &str = "localhost";
const HOST_SUFFIX: &str = "_HOST";
const PORT_SUFFIX: &str = "_PORT";
const PUBLIC_PORT_SUFFIX: &str = "_PUBLIC_PORT";

// scheme, optional userinfo, host (bracketed IPv6 allowed), optional port, rest
static REDIS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(rediss?://)(?:([^@/]*)@)?(\[[^\]/]*\]|[^:/@\[]+)(?::(\d+))?(.*)$")
        .expect("static regex pattern is valid")
});

/// A resolved service address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    /// Port as seen from the resolving context
    pub port: u16,
    /// Published port on the host machine (docker context, developer id > 0)
    pub public_port: Option<u16>,
}

impl Endpoint {
    /// `host:port` form
    #[must_use]
    ///
    /// IPv6 hosts are bracketed: `[::1]:6379`.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Split a compound `host:port` value
///
/// `[v6-host]:port` is accepted. URLs, paths, bare IPv6 addresses and
/// numeric pairs like `10:30` are not compound values.
#[must_use]
pub fn split_host_port(value: &str) -> Option<(&str, u16)> {
    let value = value.trim();
    if value.contains("://") || value.contains('/') {
        return None;
    }
    if let Some(bracketed) = value.strip_prefix('[') {
        let (host, port) = bracketed.split_once("]:")?;
        if host.is_empty() {
            return None;
        }
        return Some((host, port.parse().ok()?));
    }
    let (host, port) = value.rsplit_once(':')?;
    if host.is_empty() || host.contains(':') || host.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let port = port.parse::<u16>().ok()?;
    Some((host, port))
}

/// Expand every compound `host:port` value in `vars`
///
/// `FOO_HOST: "h:1"` becomes `FOO_HOST: h` + `FOO_PORT: 1`. Any other key
/// `FOO: "h:1"` becomes `FOO_HOST: h`, `FOO_PORT: 1` and `FOO: h`. The
/// embedded port replaces an existing `FOO_PORT`.
#[must_use]
pub fn expand_compound(vars: &VarMap) -> VarMap {
    let mut expanded = vars.clone();

    for (key, value) in vars.iter() {
        let VarValue::Text(text) = value else {
            continue;
        };
        let Some((host, port)) = split_host_port(text) else {
            continue;
        };

        match key.strip_suffix(HOST_SUFFIX).filter(|p| !p.is_empty()) {
            Some(prefix) => {
                expanded.insert(key.clone(), host);
                expanded.insert(format!("{prefix}{PORT_SUFFIX}"), port);
            }
            None => {
                expanded.insert(key.clone(), host);
                expanded.insert(format!("{key}{HOST_SUFFIX}"), host);
                expanded.insert(format!("{key}{PORT_SUFFIX}"), port);
            }
        }
    }

    expanded
}

/// Resolves service endpoints for a developer slot
#[derive(Debug, Clone)]
pub struct HostResolver {
    config: LayeredConfig,
    overrides: Environments,
    localhost_alias: Option<String>,
    developer_id: DeveloperId,
}

impl HostResolver {
    pub fn new(config: LayeredConfig, developer_id: DeveloperId) -> Self {
        Self {
            config,
            overrides: Environments::default(),
            localhost_alias: None,
            developer_id,
        }
    }

    /// Second override layer (the user's `environments.<context>`)
    #[must_use]
    pub fn with_overrides(mut self, overrides: Environments) -> Self {
        self.overrides = overrides;
        self
    }

    /// Hostname substituted for `localhost` in local context
    #[must_use]
    pub fn with_localhost_alias(mut self, alias: Option<String>) -> Self {
        self.localhost_alias = alias.filter(|a| !a.trim().is_empty());
        self
    }

    /// Same configuration, different developer slot
    #[must_use]
    pub fn with_developer(mut self, developer_id: DeveloperId) -> Self {
        self.developer_id = developer_id;
        self
    }

    #[must_use]
    pub fn developer_id(&self) -> DeveloperId {
        self.developer_id
    }

    /// Layered vars for `context` with overrides applied and compounds split
    #[must_use]
    pub fn merged_vars(&self, context: Context) -> VarMap {
        let mut vars = self.config.vars(context).clone();
        vars.merge_from(self.overrides.get(context));
        expand_compound(&vars)
    }

    /// Resolve the endpoint of `service` in `context`
    #[must_use]
    pub fn resolve(&self, context: Context, service: Service) -> Endpoint {
        self.resolve_in(&self.merged_vars(context), context, service)
    }

    fn resolve_in(&self, vars: &VarMap, context: Context, service: Service) -> Endpoint {
        let prefix = service.env_prefix();

        let host = vars
            .get_str(&format!("{prefix}{HOST_SUFFIX}"))
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| match context {
                Context::Docker => service.docker_host().to_string(),
                Context::Local => LOCALHOST.to_string(),
            });
        let host = self.apply_alias(context, host);

        let configured_port = vars
            .get(&format!("{prefix}{PORT_SUFFIX}"))
            .and_then(VarValue::as_port)
            .unwrap_or_else(|| service.base_port());

        let (port, public_port) = match context {
            Context::Local => (self.developer_id.offset(configured_port), None),
            Context::Docker if self.developer_id.is_canonical() => (configured_port, None),
            Context::Docker => (
                configured_port,
                Some(self.developer_id.offset(configured_port)),
            ),
        };

        Endpoint {
            host,
            port,
            public_port,
        }
    }

    fn apply_alias(&self, context: Context, host: String) -> String {
        match (&self.localhost_alias, context) {
            (Some(alias), Context::Local) if host == LOCALHOST => alias.clone(),
            _ => host,
        }
    }

    /// Variable map for `${VAR}` substitution in `context`
    ///
    /// Service hosts and ports are the resolved endpoints. In local context
    /// every other numeric `*_PORT` is shifted by the developer offset; in
    /// docker context each `*_PORT` gains a `*_PUBLIC_PORT` companion when the
    /// developer id is non-zero.
    #[must_use]
    pub fn var_map(&self, context: Context) -> VarMap {
        let raw = self.merged_vars(context);
        let mut vars = VarMap::new();
        let offset = !self.developer_id.is_canonical();

        for (key, value) in raw.iter() {
            let value = match value.as_port() {
                Some(port) if context == Context::Local && offset && is_port_key(key) => {
                    VarValue::from(self.developer_id.offset(port))
                }
                _ => match value {
                    VarValue::Text(host) if key.ends_with(HOST_SUFFIX) => {
                        VarValue::from(self.apply_alias(context, host.clone()))
                    }
                    other => other.clone(),
                },
            };
            vars.insert(key.clone(), value);
        }

        for service in Service::INFRA {
            let endpoint = self.resolve_in(&raw, context, service);
            let prefix = service.env_prefix();
            vars.insert(format!("{prefix}{HOST_SUFFIX}"), endpoint.host.clone());
            vars.insert(format!("{prefix}{PORT_SUFFIX}"), endpoint.port);
            if service == Service::Redis {
                let rebuilt = vars
                    .get_str("REDIS_URL")
                    .and_then(|url| with_redis_authority(&url, &endpoint));
                if let Some(url) = rebuilt {
                    vars.insert("REDIS_URL", url);
                }
            }
        }

        if context == Context::Docker && offset {
            let companions: Vec<(String, u16)> = vars
                .iter()
                .filter(|(key, _)| is_port_key(key))
                .filter_map(|(key, value)| {
                    let prefix = key.strip_suffix(PORT_SUFFIX)?;
                    let port = value.as_port()?;
                    Some((
                        format!("{prefix}{PUBLIC_PORT_SUFFIX}"),
                        self.developer_id.offset(port),
                    ))
                })
                .collect();
            for (key, port) in companions {
                vars.insert(key, port);
            }
        }

        debug!(
            "Built {} variables for {context} context (developer {})",
            vars.len(),
            self.developer_id
        );
        vars
    }
}

/// Replace the host and port of a `redis://` / `rediss://` URL
///
/// Scheme, credentials and the database path are kept. Values still holding
/// `${...}` placeholders or that are not Redis URLs give `None`.
pub(crate) fn with_redis_authority(url: &str, redis: &Endpoint) -> Option<String> {
    if url.contains("${") {
        return None;
    }
    let caps = REDIS_URL.captures(url.trim())?;
    let userinfo = caps
        .get(2)
        .map(|m| format!("{}@", m.as_str()))
        .unwrap_or_default();
    let rest = caps.get(5).map_or("", |m| m.as_str());
    Some(format!("{}{userinfo}{}{rest}", &caps[1], redis.authority()))
}

fn is_port_key(key: &str) -> bool {
    key.ends_with(PORT_SUFFIX) && !key.ends_with(PUBLIC_PORT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLayerLoader;

    fn bundled() -> LayeredConfig {
        ConfigLayerLoader::new().load().unwrap()
    }

    fn dev(id: u16) -> DeveloperId {
        DeveloperId::new(id).unwrap()
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("postgres:5432"), Some(("postgres", 5432)));
        assert_eq!(split_host_port(" 10.0.0.5:6379 "), Some(("10.0.0.5", 6379)));
        assert_eq!(split_host_port("redis://redis:6379"), None);
        assert_eq!(split_host_port("postgres"), None);
        assert_eq!(split_host_port("host:notaport"), None);
        assert_eq!(split_host_port(":5432"), None);
        assert_eq!(split_host_port("10:30"), None);
        assert_eq!(split_host_port("[::1]:6379"), Some(("::1", 6379)));
        assert_eq!(split_host_port("::1"), None);
        assert_eq!(split_host_port("[]:6379"), None);
    }

    #[test]
    fn test_ipv6_authority_is_bracketed() {
        let endpoint = Endpoint {
            host: "::1".into(),
            port: 6479,
            public_port: None,
        };
        assert_eq!(endpoint.authority(), "[::1]:6479");
        assert_eq!(
            split_host_port(&endpoint.authority()),
            Some(("::1", 6479))
        );
    }

    #[test]
    fn test_var_map_redis_url_keeps_scheme_and_credentials() {
        let mut overrides = Environments::default();
        overrides.local.insert("REDIS_URL", "rediss://:pw@cache.internal:6380/2");
        let resolver = HostResolver::new(bundled(), dev(1)).with_overrides(overrides);

        let vars = resolver.var_map(Context::Local);
        assert_eq!(
            vars.get_str("REDIS_URL").as_deref(),
            Some("rediss://:pw@localhost:6479/2")
        );
    }

    #[test]
    fn test_compound_host_key_split() {
        let vars: VarMap = [("DB_HOST", "postgres:5432")].into_iter().collect();
        let expanded = expand_compound(&vars);

        assert_eq!(expanded.get_str("DB_HOST").as_deref(), Some("postgres"));
        assert_eq!(expanded.get_str("DB_PORT").as_deref(), Some("5432"));
        assert_eq!(expanded.len(), 2);
    }

    #[test]
    fn test_compound_other_key_split() {
        let vars: VarMap = [("MINIO", "minio:9000")].into_iter().collect();
        let expanded = expand_compound(&vars);

        assert_eq!(expanded.get_str("MINIO").as_deref(), Some("minio"));
        assert_eq!(expanded.get_str("MINIO_HOST").as_deref(), Some("minio"));
        assert_eq!(expanded.get_str("MINIO_PORT").as_deref(), Some("9000"));
    }

    #[test]
    fn test_local_ports_offset_by_developer() {
        let resolver = HostResolver::new(bundled(), dev(2));
        let db = resolver.resolve(Context::Local, Service::Postgres);

        assert_eq!(db.host, "localhost");
        assert_eq!(db.port, 5632);
        assert_eq!(db.public_port, None);
    }

    #[test]
    fn test_docker_ports_not_offset() {
        let resolver = HostResolver::new(bundled(), dev(2));
        let redis = resolver.resolve(Context::Docker, Service::Redis);

        assert_eq!(redis.host, "redis");
        assert_eq!(redis.port, 6379);
        assert_eq!(redis.public_port, Some(6579));

        let canonical = HostResolver::new(bundled(), DeveloperId::CANONICAL);
        assert_eq!(
            canonical.resolve(Context::Docker, Service::Redis).public_port,
            None
        );
    }

    #[test]
    fn test_docker_default_host_when_unset() {
        let resolver = HostResolver::new(LayeredConfig::default(), DeveloperId::CANONICAL);
        let pgadmin = resolver.resolve(Context::Docker, Service::Pgadmin);
        assert_eq!(pgadmin.host, "pgadmin");
        assert_eq!(pgadmin.port, 5050);
    }

    #[test]
    fn test_localhost_alias_only_in_local_context() {
        let resolver = HostResolver::new(bundled(), DeveloperId::CANONICAL)
            .with_localhost_alias(Some("dev.internal".into()));

        assert_eq!(
            resolver.resolve(Context::Local, Service::Redis).host,
            "dev.internal"
        );
        assert_eq!(resolver.resolve(Context::Docker, Service::Redis).host, "redis");
    }

    #[test]
    fn test_override_layer_with_compound_host() {
        let mut overrides = Environments::default();
        overrides.local.insert("DB_HOST", "db.local:15432");

        let resolver = HostResolver::new(bundled(), dev(1)).with_overrides(overrides);
        let db = resolver.resolve(Context::Local, Service::Postgres);

        assert_eq!(db.host, "db.local");
        assert_eq!(db.port, 15532);
    }

    #[test]
    fn test_var_map_local() {
        let resolver = HostResolver::new(bundled(), dev(1));
        let vars = resolver.var_map(Context::Local);

        assert_eq!(vars.get_str("REDIS_HOST").as_deref(), Some("localhost"));
        assert_eq!(vars.get_str("REDIS_PORT").as_deref(), Some("6479"));
        assert_eq!(vars.get_str("DB_PORT").as_deref(), Some("5532"));
        assert_eq!(
            vars.get_str("REDIS_URL").as_deref(),
            Some("redis://localhost:6479")
        );
        assert_eq!(vars.get_str("NODE_ENV").as_deref(), Some("development"));
        assert!(!vars.contains_key("DB_PUBLIC_PORT"));
    }

    #[test]
    fn test_var_map_docker_public_ports() {
        let resolver = HostResolver::new(bundled(), dev(3));
        let vars = resolver.var_map(Context::Docker);

        assert_eq!(vars.get_str("DB_PORT").as_deref(), Some("5432"));
        assert_eq!(vars.get_str("DB_PUBLIC_PORT").as_deref(), Some("5732"));
        assert_eq!(vars.get_str("REDIS_PUBLIC_PORT").as_deref(), Some("6679"));
        assert_eq!(vars.get_str("REDIS_URL").as_deref(), Some("redis://redis:6379"));
    }

    #[test]
    fn test_var_map_canonical_has_no_public_ports() {
        let resolver = HostResolver::new(bundled(), DeveloperId::CANONICAL);
        let vars = resolver.var_map(Context::Docker);
        assert!(vars.keys().all(|k| !k.ends_with(PUBLIC_PORT_SUFFIX)));
    }
}
