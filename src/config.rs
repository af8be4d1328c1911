use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Name of the environment variable holding the API client id.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            credential_env: default_credential_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.unsplash.com".to_string()
}
fn default_page_size() -> u32 {
    20
}
fn default_credential_env() -> String {
    "CLIENT_ID".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Disk-cache root. Defaults to `<system cache dir>/photo-search`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Persist fetched bytes to the disk tier.
    #[serde(default = "default_disk")]
    pub disk: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            disk: default_disk(),
        }
    }
}

fn default_disk() -> bool {
    true
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("photo-search"),
        }
    }
}

/// Maximum `per_page` accepted by the search endpoint.
const MAX_PAGE_SIZE: u32 = 30;

/// Load and validate the config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.api.page_size == 0 || config.api.page_size > MAX_PAGE_SIZE {
        anyhow::bail!("api.page_size must be in 1..={}", MAX_PAGE_SIZE);
    }

    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }

    if config.api.base_url.trim().is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }

    if config.api.credential_env.trim().is_empty() {
        anyhow::bail!("api.credential_env must not be empty");
    }

    Ok(())
}
