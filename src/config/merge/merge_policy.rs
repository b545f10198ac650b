//! Merge rules: defaults first, later sources override earlier ones.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("repository.database_id", crate::config::default_database_id())?
        .set_default("repository.container_id", crate::config::default_container_id())?
        .set_default("repository.container_per_item_type", false)?
        .set_default("logging.level", "info")
}
