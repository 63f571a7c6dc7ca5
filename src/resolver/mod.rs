//! Environment resolution pipeline
//!
//! One request resolves one application's `.env`:
//! secrets → variable map → interpolation → endpoint rewrite → write.
//! Nothing is written unless every stage succeeds.

mod builder;

pub use builder::EnvResolverBuilder;

use crate::config::{
    AppManifest, BaseDocument, ConfigLayerLoader, ConfigProvider, Context, load_template,
};
use crate::error::{Error, Result};
use crate::hosts::HostResolver;
use crate::ports::DeveloperId;
use crate::rewrite::EnvRewriter;
use crate::secrets::{FileSecretsSource, SecretsSource, SecretsStore};
use crate::template::{TemplateInterpolator, collect_missing};
use crate::writer::{EnvWriter, WriteFlow, WriteTarget};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs of one resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub app_name: String,
    pub context: Context,
    /// Replaces the user secrets file
    pub secrets_path: Option<PathBuf>,
    /// Synthesize referenced secrets that are missing
    pub force_generate: bool,
    /// Template text; read from the app directory when absent
    pub template: Option<String>,
    pub flow: WriteFlow,
}

impl ResolveRequest {
    pub fn new(app_name: impl Into<String>, context: Context) -> Self {
        Self {
            app_name: app_name.into(),
            context,
            secrets_path: None,
            force_generate: false,
            template: None,
            flow: WriteFlow::default(),
        }
    }

    #[must_use]
    pub fn secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn force_generate(mut self, force: bool) -> Self {
        self.force_generate = force;
        self
    }

    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    #[must_use]
    pub fn flow(mut self, flow: WriteFlow) -> Self {
        self.flow = flow;
        self
    }
}

/// Resolved `.env` content and what went into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnv {
    pub content: String,
    pub developer_id: DeveloperId,
    pub context: Context,
    /// Final `PORT` value
    pub app_port: u16,
    /// Secret keys synthesized for this run
    pub generated_secrets: Vec<String>,
    /// `build.envOutputPath` from the manifest, resolved against the app dir
    pub env_output_path: Option<PathBuf>,
}

/// Resolves and writes application environments
///
/// Create with [`EnvResolver::builder`].
pub struct EnvResolver {
    provider: Arc<dyn ConfigProvider>,
    base: BaseDocument,
    remote: Option<Arc<dyn SecretsSource>>,
    temp_dir: Option<PathBuf>,
}

impl EnvResolver {
    pub fn builder() -> EnvResolverBuilder {
        EnvResolverBuilder::new()
    }

    #[must_use]
    pub fn provider(&self) -> &dyn ConfigProvider {
        self.provider.as_ref()
    }

    /// Resolve `request` without writing anything
    ///
    /// # Errors
    ///
    /// Returns the first fatal condition: unreadable user config, missing
    /// manifest or template, unusable base env-config, secrets failures, or
    /// `Error::MissingSecretReferences` listing every unresolved reference.
    pub fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedEnv> {
        let user_config = self.provider.load()?;
        let paths = self.provider.paths()?;
        let developer_id = self.provider.developer_id()?;
        let context = request.context;

        info!(
            "Resolving environment for '{}' ({context}, developer {developer_id})",
            request.app_name
        );

        let app_dir = paths.app_dir(&request.app_name);
        let manifest = AppManifest::load(&app_dir)?;
        let template = match &request.template {
            Some(text) => text.clone(),
            None => load_template(&app_dir)?,
        };

        let mut loader = ConfigLayerLoader::new().user_override(paths.env_config_override.clone());
        if let BaseDocument::File(path) = &self.base {
            loader = loader.base_file(path);
        }
        let loaded = loader.load_layers()?;
        if let Some(e) = &loaded.user_layer_error {
            warn!("{e}; using base environment config only");
        }

        let hosts = HostResolver::new(loaded.config, developer_id)
            .with_overrides(user_config.environments.clone())
            .with_localhost_alias(user_config.aifabrix_localhost.clone());

        let mut store = SecretsStore::new(&paths.user_secrets, manifest.build_secrets_path(&app_dir))
            .with_encryption_key(user_config.secrets_encryption.clone());
        if let Some(canonical) = &paths.canonical_secrets {
            if canonical.is_file() {
                store = store.with_canonical(Arc::new(FileSecretsSource::new(canonical)));
            } else {
                warn!(
                    "Canonical secrets file {} not found; skipping",
                    canonical.display()
                );
            }
        }
        if let Some(remote) = &self.remote {
            store = store.with_remote(Arc::clone(remote));
        }

        let assembled = store.assemble(
            request.secrets_path.as_deref(),
            &template,
            request.force_generate,
        )?;

        let missing = collect_missing(&template, &assembled.secrets);
        if !missing.is_empty() {
            return Err(Error::MissingSecretReferences(missing));
        }

        let base_app_port = manifest.base_app_port(context);
        let app_port = if context.applies_developer_offset() {
            developer_id.offset(base_app_port)
        } else {
            base_app_port
        };

        let mut vars = hosts.var_map(context);
        vars.insert("PORT", app_port);
        if context == Context::Docker && !developer_id.is_canonical() {
            vars.insert("PUBLIC_PORT", developer_id.offset(base_app_port));
        }

        let interpolated =
            TemplateInterpolator::new(&assembled.secrets, &vars).interpolate(&template);
        let content = EnvRewriter::new(&hosts, base_app_port).rewrite(
            &interpolated,
            context,
            developer_id,
            None,
        );
        debug!(
            "Resolved {} lines for '{}'",
            content.lines().count(),
            request.app_name
        );

        Ok(ResolvedEnv {
            content,
            developer_id,
            context,
            app_port,
            generated_secrets: assembled.generated,
            env_output_path: manifest.env_output_path(&app_dir),
        })
    }

    /// Resolve `request` and write the result to `target`
    ///
    /// # Errors
    ///
    /// Any error from [`EnvResolver::resolve`], plus
    /// `Error::ForbiddenOutputPath` and write failures. Shared output
    /// directories are matched below the parent of the builder directory.
    pub fn generate(&self, request: &ResolveRequest, target: &WriteTarget) -> Result<PathBuf> {
        let resolved = self.resolve(request)?;
        let paths = self.provider.paths()?;

        let mut writer = EnvWriter::new(&request.app_name, request.flow);
        if let Some(project_root) = paths.builder_dir.parent() {
            writer = writer.project_root(project_root);
        }
        if let Some(dir) = &self.temp_dir {
            writer = writer.temp_dir(dir);
        }
        writer.write(&resolved.content, target)
    }
}
