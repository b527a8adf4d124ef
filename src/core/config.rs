use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.exchangerate.host";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Appended to upstream requests as `access_key` when set.
    pub access_key: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            access_key: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_provider_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    /// Seconds a successful response stays cached.
    pub timeout_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { timeout_secs: 300 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Base currency used for conversion snapshots and rate queries
    /// without an explicit `base`.
    #[serde(default = "default_base")]
    pub default_base: String,
}

fn default_base() -> String {
    "USD".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            default_base: default_base(),
        }
    }
}

impl AppConfig {
    /// Loads the config file, if any, then applies process environment
    /// overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let path = Self::default_config_path()?;
                if path.exists() {
                    Self::load_from_path(&path)?
                } else {
                    debug!("No config file at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxgate", "fxgate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Overrides settings from environment-style variables read via `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        if let Some(url) = first(&["PROVIDER_BASE_URL", "PROVIDER_URL"]) {
            self.provider.base_url = url;
        }
        if let Some(key) = first(&["ACCESS_KEY", "API_KEY", "EXCHANGE_API_KEY"]) {
            self.provider.access_key = Some(key);
        }
        if let Some(timeout) = first(&["CACHE_TIMEOUT"]) {
            self.cache.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid CACHE_TIMEOUT: {timeout}"))?;
        }
        if let Some(addr) = first(&["LISTEN_ADDR"]) {
            self.server.listen_addr = addr;
        }
        if let Some(base) = first(&["DEFAULT_BASE"]) {
            self.default_base = base.to_uppercase();
        }
        Ok(())
    }
}
