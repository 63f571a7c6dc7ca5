//! Configuration inputs for environment resolution
//!
//! This module contains everything read before resolution starts:
//! - `LayeredConfig` - base env-config document merged with the user layer
//! - `ConfigProvider` - cached access to the user's `config.yaml`
//! - `AppManifest` - the application's `variables.yaml`

mod layered;
mod manifest;
mod provider;
mod types;

pub use layered::{
    BUNDLED_ENV_CONFIG, BaseDocument, ConfigLayerLoader, Environments, LayeredConfig,
    LoadedConfig,
};
pub use manifest::{
    AppManifest, AppSection, BUILD_SECRETS_FILE, BuildSection, MANIFEST_FILE, TEMPLATE_FILE,
    load_template,
};
pub use provider::{
    AifabrixPaths, ConfigProvider, DEVELOPER_ID_ENV, FileConfigProvider, HOME_ENV,
    RawDeveloperId, StaticConfigProvider, UserConfig,
};
pub use types::{
    Context, DefaultEnvSource, EnvSource, MapEnvSource, VarMap, VarValue, expand_home,
};
