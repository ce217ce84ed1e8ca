//! Search API credentials, resolved from Secret Manager

use anyhow::{Context, Result};
use bqline_gcp::SecretStore;
use serde::Deserialize;

/// Secret names holding the four OAuth 1.0a values
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretNames {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            consumer_key: "consumer_key".to_string(),
            consumer_secret: "consumer_secret".to_string(),
            access_token: "access_token".to_string(),
            access_token_secret: "access_token_secret".to_string(),
        }
    }
}

/// User-context credentials for the search API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// Resolve all four secrets. Any single failure is fatal.
pub fn load_credentials(store: &dyn SecretStore, names: &SecretNames) -> Result<Credentials> {
    let fetch = |name: &str| {
        store
            .access_latest(name)
            .with_context(|| format!("Cannot load secret {name}"))
    };
    let creds = Credentials {
        consumer_key: fetch(&names.consumer_key)?,
        consumer_secret: fetch(&names.consumer_secret)?,
        access_token: fetch(&names.access_token)?,
        access_token_secret: fetch(&names.access_token_secret)?,
    };
    log::info!("Loaded search API credentials from Secret Manager");
    Ok(creds)
}
