//! Schema generator configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project whose tables are described. Empty means the credentials' project.
    pub project: String,
    /// `source` of both generated Terraform modules
    pub module_source: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: String::new(),
            module_source: "../reusable/tfrm-bigquery".to_string(),
        }
    }
}
