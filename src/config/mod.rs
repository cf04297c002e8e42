mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LogSettings, PresenceSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `QUILLCAST__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "QUILLCAST";

/// Loads the configuration from `config/default` and environment variables,
/// merged over default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] but reads the optional file at `path`
/// (extension may be omitted).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}
