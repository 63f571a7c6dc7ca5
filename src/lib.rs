//! # aifabrix-env - Layered Environment & Secrets Resolution
//!
//! Generates per-developer `.env` files for containerized applications from a
//! template, layered environment configuration and secrets files.
//!
//! ## Features
//!
//! - **Layered Config**: Bundled base environment document merged with a per-user override
//! - **Developer Ports**: Non-colliding port blocks (`base + developer_id * 100`)
//! - **Two Contexts**: `docker` (service DNS names, fixed ports) and `local` (localhost, offset ports)
//! - **Secrets**: User, build, canonical and remote sources with `secure://` AES-256-GCM decryption
//! - **Generation**: Missing secrets synthesized from key-name conventions
//! - **Safe Output**: `.env` files written atomically with owner-only permissions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aifabrix_env::{Context, EnvResolver, ResolveRequest, WriteTarget};
//! use std::path::PathBuf;
//!
//! let resolver = EnvResolver::builder().build();
//!
//! let request = ResolveRequest::new("my-app", Context::Local);
//! let resolved = resolver.resolve(&request)?;
//! println!("PORT={}", resolved.app_port);
//!
//! // Resolve and write
//! let path = resolver.generate(&request, &WriteTarget::Path(PathBuf::from("my-app/.env")))?;
//! # Ok::<(), aifabrix_env::Error>(())
//! ```
//!
//! ## Developer Ports
//!
//! ```rust
//! use aifabrix_env::{DeveloperId, ports_for};
//!
//! let ports = ports_for(DeveloperId::new(2)?);
//! assert_eq!(ports.app, 3200);
//! assert_eq!(ports.postgres, 5632);
//! # Ok::<(), aifabrix_env::Error>(())
//! ```
//!
//! ## Template Syntax
//!
//! - `kv://<key>` - a secret from the assembled secrets map
//! - `${VAR}` - a variable from the resolved environment config
//!
//! Blank lines and `#` comments are copied through untouched.
//!
//! ```rust
//! use aifabrix_env::{SecretsMap, TemplateInterpolator, VarMap};
//!
//! let secrets: SecretsMap = [("db-password", "s3cr3t")].into_iter().collect();
//! let vars: VarMap = [("DB_HOST", "localhost")].into_iter().collect();
//!
//! let out = TemplateInterpolator::new(&secrets, &vars)
//!     .interpolate("DB_HOST=${DB_HOST}\nDB_PASSWORD=kv://db-password\n");
//! assert_eq!(out, "DB_HOST=localhost\nDB_PASSWORD=s3cr3t\n");
//! ```

// Core modules
mod error;
pub mod security;
pub mod storage;

// Grouped modules
pub mod config;
pub mod dotenv;
pub mod hosts;
pub mod ports;
pub mod resolver;
pub mod rewrite;
pub mod secrets;
pub mod template;
pub mod writer;

// Re-exports from core
pub use error::{Error, Result};
pub use storage::{StorageBackend, YamlStorage};

#[cfg(feature = "json")]
pub use storage::JsonStorage;

// Re-exports from config
pub use config::{
    AppManifest, ConfigLayerLoader, ConfigProvider, Context, DefaultEnvSource, EnvSource,
    FileConfigProvider, LayeredConfig, StaticConfigProvider, UserConfig, VarMap, VarValue,
};

// Pipeline re-exports
pub use dotenv::{EnvDocument, EnvLine};
pub use hosts::{Endpoint, HostResolver};
pub use ports::{DeveloperId, PortSet, Service, ports_for, ports_for_raw};
pub use resolver::{EnvResolver, EnvResolverBuilder, ResolveRequest, ResolvedEnv};
pub use rewrite::EnvRewriter;
pub use secrets::{
    EncryptionKey, FileSecretsSource, MemorySecretsSource, SecretsMap, SecretsSource,
    SecretsStore,
};
pub use template::{TemplateInterpolator, collect_missing};
pub use writer::{EnvWriter, WriteFlow, WriteTarget};
