//! Builder for EnvResolver
//!
//! This module contains [`EnvResolverBuilder`] which provides a fluent API
//! for creating an [`EnvResolver`](super::EnvResolver).

use crate::config::{BaseDocument, ConfigProvider, FileConfigProvider};
use crate::secrets::SecretsSource;
use std::path::PathBuf;
use std::sync::Arc;

use super::EnvResolver;

/// Builder for creating an [`EnvResolver`] with a fluent API.
///
/// # Example
///
/// ```rust,no_run
/// use aifabrix_env::{Context, EnvResolver, ResolveRequest, WriteTarget};
///
/// let resolver = EnvResolver::builder()
///     .base_config("/etc/aifabrix/env-config.yaml")
///     .build();
///
/// let request = ResolveRequest::new("my-app", Context::Local).force_generate(true);
/// let path = resolver.generate(&request, &WriteTarget::Ephemeral)?;
/// # Ok::<(), aifabrix_env::Error>(())
/// ```
#[derive(Default)]
pub struct EnvResolverBuilder {
    provider: Option<Arc<dyn ConfigProvider>>,
    base: BaseDocument,
    remote: Option<Arc<dyn SecretsSource>>,
    temp_dir: Option<PathBuf>,
}

impl EnvResolverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration provider (default: `config.yaml` in the aifabrix home
    /// located from the process environment)
    pub fn config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Base env-config document on disk instead of the bundled one
    pub fn base_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.base = BaseDocument::File(path.into());
        self
    }

    /// Remote secrets collaborator, consulted as a gap-filler
    pub fn remote_secrets(mut self, source: Arc<dyn SecretsSource>) -> Self {
        self.remote = Some(source);
        self
    }

    /// Directory for ephemeral `.env` files (default: the system temp dir)
    pub fn temp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(path.into());
        self
    }

    /// Build the resolver
    pub fn build(self) -> EnvResolver {
        EnvResolver {
            provider: self
                .provider
                .unwrap_or_else(|| Arc::new(FileConfigProvider::from_process_env())),
            base: self.base,
            remote: self.remote,
            temp_dir: self.temp_dir,
        }
    }
}
