//! Configuration loading entry point.

use crate::config::merge::merge_policy;
use crate::config::sources::{env_vars, file_source};
use crate::config::RepositoryConfig;
use config::ConfigError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// Precedence (highest last): defaults, `config_file` and its environment
    /// overlay, `COSMOS_REPOSITORY__*` environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<RepositoryConfig, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        if let Some(path) = config_file {
            builder = file_source::add_to_builder(builder, path)?;
        }
        builder = env_vars::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Load a single file over the defaults, ignoring the environment.
    pub fn load_file(config_file: &Path) -> Result<RepositoryConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = file_source::add_to_builder(builder, config_file)?;
        builder.build()?.try_deserialize()
    }
}
