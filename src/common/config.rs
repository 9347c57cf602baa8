//! Configuration for rwcache
//!
//! Values come from an optional TOML file overlaid with `RWCACHE_*`
//! environment variables, e.g. `RWCACHE_SERVERS=10.0.0.1:11211,10.0.0.2:11211`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "RWCACHE";
const DEFAULT_FILE: &str = "rwcache";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend servers as `host:port`; every write goes to all of them
    #[serde(default)]
    pub servers: Vec<String>,

    /// Dial and per-operation I/O timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Idle connections kept per server
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: usize,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout_ms() -> u64 {
    100
}
fn default_max_idle_conns() -> usize {
    2
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            timeout_ms: default_timeout_ms(),
            max_idle_conns: default_max_idle_conns(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load `rwcache.toml` from the working directory if present, then the environment.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit file (which must exist), then the environment.
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> crate::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_FILE).required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(prefix)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("servers"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
