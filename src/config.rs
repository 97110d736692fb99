use anyhow::{anyhow, Result};
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::ConnectionError;

/// Settings for session pools created by the factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of sessions checked out at once
    pub max_size: usize,

    /// How long `acquire` waits for a free slot, in milliseconds
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 64,
            acquire_timeout_ms: 30_000,
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Reject settings no pool can run with
    pub fn validate(&self) -> std::result::Result<(), ConnectionError> {
        if self.max_size == 0 {
            return Err(ConnectionError::InvalidSettings(
                "pool.max_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Factory configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorySettings {
    /// Remote hosts, as `host[:port]`. Only the first one is used.
    pub hosts: Vec<String>,

    pub pool: PoolSettings,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            pool: PoolSettings::default(),
        }
    }
}

const EMPTY_CONFIG: &str = r#"### chambers-remote configuration file

### remote hosts, only the first entry is contacted
# hosts = ["localhost:2424"]

### session pool settings
# [pool]
# max_size = 64
# acquire_timeout_ms = 30000
"#;

impl FactorySettings {
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load settings from a TOML file and the environment.
    ///
    /// Without a path, `<config dir>/chambers/remote.toml` is used and created
    /// with commented defaults when missing. Environment variables prefixed
    /// with `CHAMBERS_` override the file, e.g. `CHAMBERS_HOSTS=a,b` or
    /// `CHAMBERS_POOL__MAX_SIZE=8`.
    pub fn load(path: Option<&Path>) -> Result<FactorySettings> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::default_path()?;
                if let Some(parent) = p.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| anyhow!("Unable to create config directory: {}", e))?;
                }
                if !p.exists() {
                    std::fs::write(&p, EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.display(), e)
                    })?;
                }
                p
            }
        };

        Self::from_sources(&path, None)
    }

    /// Build settings from `path` and the `CHAMBERS_` environment.
    ///
    /// `env` replaces the process environment when given.
    fn from_sources(path: &Path, env: Option<config::Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CHAMBERS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("hosts")
                .try_parsing(true)
                .source(env),
        );

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?
            .try_deserialize::<FactorySettings>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        settings.pool.validate()?;
        Ok(settings)
    }

    fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join("chambers").join("remote.toml"))
    }
}
