//! Developer port allocation
//!
//! Every developer on a machine gets a disjoint port block: the canonical
//! base ports shifted by `developer_id * 100`. Developer `0` is the shared
//! slot and uses the base ports unchanged.

use crate::error::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port distance between two adjacent developer slots
pub const DEVELOPER_PORT_STRIDE: u16 = 100;

/// Largest developer id whose port block still fits in `u16`
pub const MAX_DEVELOPER_ID: u16 = (u16::MAX - 8081) / DEVELOPER_PORT_STRIDE;

/// Identifier of an isolated local environment slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeveloperId(u16);

impl DeveloperId {
    /// The shared/canonical infrastructure slot
    pub const CANONICAL: DeveloperId = DeveloperId(0);

    /// # Errors
    ///
    /// Returns `Error::InvalidDeveloperId` if `id` exceeds [`MAX_DEVELOPER_ID`].
    pub fn new(id: u16) -> Result<Self> {
        if id > MAX_DEVELOPER_ID {
            return Err(Error::InvalidDeveloperId(id.to_string()));
        }
        Ok(Self(id))
    }

    /// Strictly parse a developer id
    ///
    /// Accepts only a plain non-negative decimal integer (surrounding
    /// whitespace allowed).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDeveloperId` for negative, fractional,
    /// non-numeric or out-of-range input.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDeveloperId(raw.to_string()));
        }
        let id: u16 = trimmed
            .parse()
            .map_err(|_| Error::InvalidDeveloperId(raw.to_string()))?;
        Self::new(id)
    }

    /// Parse, falling back to the canonical slot on malformed input
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|e| {
            warn!("{e}; using developer id 0");
            Self::CANONICAL
        })
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn is_canonical(self) -> bool {
        self.0 == 0
    }

    /// Port offset for this slot (`id * 100`)
    #[must_use]
    pub fn port_offset(self) -> u16 {
        self.0.saturating_mul(DEVELOPER_PORT_STRIDE)
    }

    /// Shift `port` into this developer's block
    #[must_use]
    pub fn offset(self, port: u16) -> u16 {
        port.saturating_add(self.port_offset())
    }
}

impl fmt::Display for DeveloperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Services
// =============================================================================

/// Services with a fixed base port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    App,
    Postgres,
    Redis,
    Pgadmin,
    RedisCommander,
}

impl Service {
    /// Infrastructure services resolved by the host resolver
    pub const INFRA: [Service; 4] = [
        Service::Postgres,
        Service::Redis,
        Service::Pgadmin,
        Service::RedisCommander,
    ];

    #[must_use]
    pub fn base_port(self) -> u16 {
        match self {
            Service::App => 3000,
            Service::Postgres => 5432,
            Service::Redis => 6379,
            Service::Pgadmin => 5050,
            Service::RedisCommander => 8081,
        }
    }

    /// Variable prefix used in env configs (`DB_HOST`, `REDIS_PORT`, ...)
    #[must_use]
    pub fn env_prefix(self) -> &'static str {
        match self {
            Service::App => "APP",
            Service::Postgres => "DB",
            Service::Redis => "REDIS",
            Service::Pgadmin => "PGADMIN",
            Service::RedisCommander => "REDIS_COMMANDER",
        }
    }

    /// Service DNS name inside the compose network
    #[must_use]
    pub fn docker_host(self) -> &'static str {
        match self {
            Service::App => "localhost",
            Service::Postgres => "postgres",
            Service::Redis => "redis",
            Service::Pgadmin => "pgadmin",
            Service::RedisCommander => "redis-commander",
        }
    }
}

/// Port assignment for every fixed service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSet {
    pub app: u16,
    pub postgres: u16,
    pub redis: u16,
    pub pgadmin: u16,
    pub redis_commander: u16,
}

impl PortSet {
    /// Canonical base ports
    pub const BASE: PortSet = PortSet {
        app: 3000,
        postgres: 5432,
        redis: 6379,
        pgadmin: 5050,
        redis_commander: 8081,
    };

    #[must_use]
    pub fn get(&self, service: Service) -> u16 {
        match service {
            Service::App => self.app,
            Service::Postgres => self.postgres,
            Service::Redis => self.redis,
            Service::Pgadmin => self.pgadmin,
            Service::RedisCommander => self.redis_commander,
        }
    }
}

impl Default for PortSet {
    fn default() -> Self {
        Self::BASE
    }
}

/// Port block for a developer slot
#[must_use]
pub fn ports_for(id: DeveloperId) -> PortSet {
    let base = PortSet::BASE;
    PortSet {
        app: id.offset(base.app),
        postgres: id.offset(base.postgres),
        redis: id.offset(base.redis),
        pgadmin: id.offset(base.pgadmin),
        redis_commander: id.offset(base.redis_commander),
    }
}

/// Port block for an unvalidated developer id
///
/// # Errors
///
/// Returns `Error::InvalidDeveloperId` if `raw` is not a non-negative integer.
pub fn ports_for_raw(raw: &str) -> Result<PortSet> {
    DeveloperId::parse(raw).map(ports_for)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_slot_uses_base_ports() {
        assert_eq!(ports_for(DeveloperId::CANONICAL), PortSet::BASE);
    }

    #[test]
    fn test_offset_law_for_every_service() {
        for id in [1u16, 2, 7, 42, MAX_DEVELOPER_ID] {
            let dev = DeveloperId::new(id).unwrap();
            let ports = ports_for(dev);
            for service in [
                Service::App,
                Service::Postgres,
                Service::Redis,
                Service::Pgadmin,
                Service::RedisCommander,
            ] {
                assert_eq!(
                    u32::from(ports.get(service)),
                    u32::from(service.base_port()) + u32::from(id) * 100,
                    "service {service:?} dev {id}"
                );
            }
        }
    }

    #[test]
    fn test_strict_parse_rejects_bad_shapes() {
        for raw in ["-1", "1.5", "abc", "", " ", "1e3", "+2"] {
            assert!(
                matches!(DeveloperId::parse(raw), Err(Error::InvalidDeveloperId(_))),
                "{raw:?} should be rejected"
            );
        }
        assert!(ports_for_raw("-3").is_err());
    }

    #[test]
    fn test_strict_parse_accepts_integers() {
        assert_eq!(DeveloperId::parse("0").unwrap(), DeveloperId::CANONICAL);
        assert_eq!(DeveloperId::parse(" 12 ").unwrap().get(), 12);
        assert_eq!(ports_for_raw("2").unwrap().app, 3200);
    }

    #[test]
    fn test_out_of_range_id_rejected() {
        let too_big = (MAX_DEVELOPER_ID + 1).to_string();
        assert!(DeveloperId::parse(&too_big).is_err());
    }

    #[test]
    fn test_lenient_parse_falls_back_to_zero() {
        assert_eq!(DeveloperId::parse_lenient("nope"), DeveloperId::CANONICAL);
        assert_eq!(DeveloperId::parse_lenient("4").get(), 4);
    }
}
