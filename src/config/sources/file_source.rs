//! Config file source: `<name>.toml` and `<name>.{COSMOS_REPOSITORY_ENV}.toml`

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the deployment overlay file.
pub const ENV_NAME_VAR: &str = "COSMOS_REPOSITORY_ENV";

/// Overlay path for `base` under the current environment name, if one is set.
pub fn overlay_path(base: &Path) -> Option<PathBuf> {
    let env_name = std::env::var(ENV_NAME_VAR).ok()?;
    let stem = base.file_stem()?.to_str()?;
    let extension = base.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    Some(base.with_file_name(format!("{}.{}.{}", stem, env_name, extension)))
}

/// Add the config file (required) and its environment overlay (optional).
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    config_file: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let mut builder = builder.add_source(File::from(config_file.to_path_buf()).required(true));

    if let Some(overlay) = overlay_path(config_file) {
        if overlay.exists() {
            debug!(overlay = %overlay.display(), "Applying environment config overlay");
            builder = builder.add_source(File::from(overlay).required(false));
        }
    }

    Ok(builder)
}
