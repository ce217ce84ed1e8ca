//! Storage-event triggers: which uploaded objects start a generation run

use anyhow::{Context, Result};
use serde::Deserialize;

/// Object prefix of generated Terraform configs
pub const CONFIG_PREFIX: &str = "datasets_tables_tf_config";
/// Object prefix of generated schema files
pub const SCHEMA_PREFIX: &str = "table_schema_jsons";

const SPREADSHEET_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// The two fields of a finalize event the generator reads. Everything
/// else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriggerEvent {
    pub bucket: String,
    pub name: String,
}

impl TriggerEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Event payload needs string fields bucket and name")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Top-level spreadsheet to generate from
    Spreadsheet { base_name: String },
    /// One of our own outputs landing in the bucket
    GeneratedArtifact,
    /// Nested object or unsupported extension
    Unsupported,
}

/// Decide what to do with an object named `name`.
///
/// Generated outputs are recognized first so a run never re-triggers
/// itself.
pub fn classify_trigger(name: &str) -> Trigger {
    if name.contains(SCHEMA_PREFIX) || name.contains(CONFIG_PREFIX) {
        return Trigger::GeneratedArtifact;
    }
    if name.contains('/') {
        return Trigger::Unsupported;
    }
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && SPREADSHEET_EXTENSIONS.contains(&ext) => {
            Trigger::Spreadsheet {
                base_name: base.to_string(),
            }
        }
        _ => Trigger::Unsupported,
    }
}
