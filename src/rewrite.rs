//! Post-interpolation endpoint rewriting
//!
//! Applied in order:
//! 1. `PORT` is set to the application port for the context
//! 2. `http(s)://localhost:<base app port>` is moved to the offset port
//! 3. Redis and Postgres endpoint variables take the resolved host and port
//!
//! Every step writes values computed from the inputs alone, so rewriting
//! already-rewritten content changes nothing.

use crate::config::Context;
use crate::dotenv::{EnvDocument, EnvLine};
use crate::hosts::{Endpoint, HostResolver, split_host_port, with_redis_authority};
use crate::ports::{DeveloperId, PortSet, Service};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

static LOCALHOST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(https?://localhost:)(\d+)").expect("static regex pattern is valid")
});

/// Rewrites `PORT`, localhost URLs and infra endpoint variables
pub struct EnvRewriter<'a> {
    hosts: &'a HostResolver,
    base_app_port: u16,
}

impl<'a> EnvRewriter<'a> {
    /// `base_app_port` is the application port before any developer offset
    pub fn new(hosts: &'a HostResolver, base_app_port: u16) -> Self {
        Self {
            hosts,
            base_app_port,
        }
    }

    /// Rewrite `content` for `context` and `developer_id`
    ///
    /// `override_ports`, when given, are used as the final ports instead of
    /// the computed ones.
    #[must_use]
    pub fn rewrite(
        &self,
        content: &str,
        context: Context,
        developer_id: DeveloperId,
        override_ports: Option<&PortSet>,
    ) -> String {
        let hosts = if developer_id == self.hosts.developer_id() {
            Cow::Borrowed(self.hosts)
        } else {
            Cow::Owned(self.hosts.clone().with_developer(developer_id))
        };

        let app_port = match override_ports {
            Some(ports) => ports.app,
            None if context.applies_developer_offset() => developer_id.offset(self.base_app_port),
            None => self.base_app_port,
        };

        let mut doc = EnvDocument::parse(content);

        doc.set_or_append("PORT", &app_port.to_string());
        self.rewrite_localhost_urls(&mut doc, app_port);

        let endpoint = |service: Service| {
            let mut endpoint = hosts.resolve(context, service);
            if let Some(ports) = override_ports {
                endpoint.port = ports.get(service);
            }
            endpoint
        };
        let redis = endpoint(Service::Redis);
        let db = endpoint(Service::Postgres);

        rewrite_host_pair(&mut doc, "REDIS_HOST", &["REDIS_PORT"], &redis);
        rewrite_host_pair(&mut doc, "DB_HOST", &["DB_PORT", "DATABASE_PORT"], &db);
        doc.map_values(|key, value| match key {
            "REDIS_URL" => with_redis_authority(value, &redis),
            _ => None,
        });

        if context == Context::Docker && !developer_id.is_canonical() {
            if let Some(port) = db.public_port {
                doc.set("DB_PUBLIC_PORT", &port.to_string());
            }
            if let Some(port) = redis.public_port {
                doc.set("REDIS_PUBLIC_PORT", &port.to_string());
            }
            doc.set(
                "PUBLIC_PORT",
                &developer_id.offset(self.base_app_port).to_string(),
            );
        }

        doc.to_string()
    }

    fn rewrite_localhost_urls(&self, doc: &mut EnvDocument, app_port: u16) {
        if app_port == self.base_app_port {
            return;
        }
        let base = self.base_app_port.to_string();
        let replace = |text: &str| -> String {
            LOCALHOST_URL
                .replace_all(text, |caps: &Captures| {
                    if caps[2] == base {
                        format!("{}{app_port}", &caps[1])
                    } else {
                        caps[0].to_string()
                    }
                })
                .into_owned()
        };

        for line in doc.lines_mut() {
            match line {
                EnvLine::Assignment { value, .. } => *value = replace(value),
                EnvLine::Other(raw) => *raw = replace(raw),
                EnvLine::Blank(_) | EnvLine::Comment(_) => {}
            }
        }
    }
}

/// Set `host_key` and its port keys, keeping a compound `host:port` shape
///
/// A plain host with no port line gains one, so both halves stay in sync.
fn rewrite_host_pair(doc: &mut EnvDocument, host_key: &str, port_keys: &[&str], endpoint: &Endpoint) {
    let Some(current) = doc.get(host_key) else {
        for key in port_keys {
            doc.set(key, &endpoint.port.to_string());
        }
        return;
    };

    if split_host_port(current).is_some() {
        doc.set(host_key, &endpoint.authority());
    } else {
        doc.set(host_key, &endpoint.host);
    }

    let mut any_port = false;
    for key in port_keys {
        any_port |= doc.set(key, &endpoint.port.to_string());
    }
    if !any_port && split_host_port(doc.get(host_key).unwrap_or_default()).is_none() {
        if let Some(first) = port_keys.first() {
            doc.set_or_append(first, &endpoint.port.to_string());
        }
    }
}
