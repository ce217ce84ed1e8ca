//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bqline_gcp::GoogleAuth;
use serde::Deserialize;

/// Global configuration for bqline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gcp: GcpConfig,
    pub http: HttpSettings,
    pub tweets: bqline_tweets::Config,
    pub schema: bqline_schema::Config,
    /// File this config was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Credentials shared by both pipelines
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GcpConfig {
    /// Service-account key; overrides `tweets.key_file`
    #[serde(deserialize_with = "deserialize_env_path")]
    pub key_file: Option<PathBuf>,
    /// Pre-minted OAuth access token, usually `${GCP_ACCESS_TOKEN}`
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_token: Option<String>,
}

impl GcpConfig {
    /// Token source for GCP calls: explicit token, then a key file
    /// (`[gcp]` first, then `fallback_key`), then ambient discovery.
    pub fn auth(&self, fallback_key: Option<&Path>) -> Result<GoogleAuth> {
        if let Some(token) = &self.access_token {
            return Ok(GoogleAuth::static_token(token.clone()));
        }
        let key_file = self.key_file.as_deref().or(fallback_key);
        let auth = GoogleAuth::discover(key_file)?;
        log::debug!("Authenticating with {}", auth.source_name());
        Ok(auth)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Seconds
    pub read_timeout: u64,
    /// Seconds
    pub connect_timeout: u64,
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = bqline_core::HttpConfig::default();
        Self {
            read_timeout: defaults.read_timeout.as_secs(),
            connect_timeout: defaults.connect_timeout.as_secs(),
            max_retries: defaults.max_retries,
        }
    }
}

impl HttpSettings {
    pub fn to_http_config(self) -> bqline_core::HttpConfig {
        bqline_core::HttpConfig {
            read_timeout: Duration::from_secs(self.read_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            max_retries: self.max_retries,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

fn deserialize_env_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_env_var(deserializer)?.map(PathBuf::from))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./bqline.toml (current directory)
    /// 2. ~/.config/bqline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("bqline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "bqline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
