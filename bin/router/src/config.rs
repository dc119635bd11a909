//! Centralized router configuration.
//!
//! Loaded via the `config` crate from an optional TOML file, then from
//! environment variables prefixed with `WAYPOINT_` (nested keys use `__`).

use serde::Deserialize;
use std::path::Path;

/// Default configuration file, read from the working directory if present.
pub const DEFAULT_CONFIG_FILE: &str = "waypoint.toml";

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouterConfig {
    /// Tracing filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Refuse to route against a workflow with validation violations.
    #[serde(default = "default_require_valid")]
    pub require_valid: bool,

    /// Pretty-print JSON output.
    #[serde(default)]
    pub pretty: bool,

    /// Remove routes a stage move left pointing backward instead of
    /// reporting them.
    #[serde(default)]
    pub prune_on_move: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_require_valid() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            require_valid: default_require_valid(),
            pretty: false,
            prune_on_move: false,
        }
    }
}

impl RouterConfig {
    /// Loads configuration from `path` (or [`DEFAULT_CONFIG_FILE`]) and the
    /// environment. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment value is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        config::Config::builder()
            .add_source(config::File::from(file).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix("WAYPOINT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
