use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Toml};

use crate::config::types::Settings;
use crate::error::ReviewerError;

// Embedded default TOML files, so the binary is self-contained.
static CONFIGURATION_TOML: &str = include_str!("../../settings/configuration.toml");
static PROMPTS_TOML: &str = include_str!("../../settings/prompts.toml");

/// Load settings by layering, lowest priority first:
/// 1. embedded defaults (`settings/*.toml`)
/// 2. an optional user config file
/// 3. `CODE_REVIEWER_`-prefixed environment variables
///    (`CODE_REVIEWER_OPENAI__KEY`, `CODE_REVIEWER_CONFIG__MODEL`, ...)
pub fn load_settings(config_file: Option<&Path>) -> Result<Settings, ReviewerError> {
    let mut figment = Figment::new()
        .merge(Toml::string(CONFIGURATION_TOML))
        .merge(Toml::string(PROMPTS_TOML));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("CODE_REVIEWER_").split("__"));

    Ok(figment.extract()?)
}
