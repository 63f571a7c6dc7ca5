//! Common test utilities for aifabrix-env integration tests
//!
//! Provides a temporary aifabrix home plus builder directory and helpers to
//! populate them.

#![allow(dead_code)]

use aifabrix_env::config::{DEVELOPER_ID_ENV, MapEnvSource};
use aifabrix_env::{ConfigProvider, EnvResolver, FileConfigProvider};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const APP: &str = "test-app";

// =============================================================================
// Test Fixtures
// =============================================================================

/// Temporary layout:
///
/// ```text
/// <tmp>/home/config.yaml
/// <tmp>/home/secrets.local.yaml
/// <tmp>/builder/<app>/variables.yaml
/// <tmp>/builder/<app>/env.template
/// ```
pub struct TestFixture {
    pub temp_dir: TempDir,
    developer_id: Option<String>,
}

impl TestFixture {
    /// Empty home and builder directories with a minimal `config.yaml`
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join("home")).expect("Failed to create home");
        fs::create_dir_all(temp_dir.path().join("builder")).expect("Failed to create builder");

        let fixture = Self {
            temp_dir,
            developer_id: None,
        };
        fixture.write_config("");
        fixture
    }

    /// Fixture whose process environment sets `AIFABRIX_DEVELOPERID`
    pub fn with_developer(id: u16) -> Self {
        let mut fixture = Self::new();
        fixture.developer_id = Some(id.to_string());
        fixture
    }

    pub fn home(&self) -> PathBuf {
        self.temp_dir.path().join("home")
    }

    pub fn builder_dir(&self) -> PathBuf {
        self.temp_dir.path().join("builder")
    }

    pub fn app_dir(&self, app: &str) -> PathBuf {
        self.builder_dir().join(app)
    }

    pub fn user_secrets_path(&self) -> PathBuf {
        self.home().join("secrets.local.yaml")
    }

    /// Write `config.yaml`; `builder-dir` always points at the fixture
    pub fn write_config(&self, extra: &str) {
        let content = format!(
            "builder-dir: '{}'\n{extra}",
            self.builder_dir().display()
        );
        write(&self.home().join("config.yaml"), &content);
    }

    pub fn write_manifest(&self, app: &str, yaml: &str) {
        write(&self.app_dir(app).join("variables.yaml"), yaml);
    }

    pub fn write_template(&self, app: &str, template: &str) {
        write(&self.app_dir(app).join("env.template"), template);
    }

    pub fn write_user_secrets(&self, yaml: &str) {
        write(&self.user_secrets_path(), yaml);
    }

    pub fn write_build_secrets(&self, app: &str, yaml: &str) {
        write(&self.app_dir(app).join("secrets.local.yaml"), yaml);
    }

    /// Write an arbitrary file under the temp dir and return its path
    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(relative);
        write(&path, content);
        path
    }

    /// File-backed provider rooted at the fixture home
    pub fn provider(&self) -> Arc<dyn ConfigProvider> {
        let env = match &self.developer_id {
            Some(id) => MapEnvSource::new([(DEVELOPER_ID_ENV, id.as_str())]),
            None => MapEnvSource::default(),
        };
        Arc::new(FileConfigProvider::new(self.home(), Arc::new(env)))
    }

    /// Resolver using the fixture provider and a fixture-local temp dir
    pub fn resolver(&self) -> EnvResolver {
        EnvResolver::builder()
            .config_provider(self.provider())
            .temp_dir(self.temp_dir.path().join("tmp"))
            .build()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write fixture file");
}

/// Value of the first `KEY=` line in `.env` content
pub fn env_value<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
}

#[cfg(unix)]
pub fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).expect("metadata").permissions().mode() & 0o777
}
