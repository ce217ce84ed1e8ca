//! bqline Schema - Terraform config and table schemas from a spreadsheet
//!
//! A spreadsheet dropped at the top level of a bucket lists datasets and,
//! optionally, their tables. Each run reads the live table metadata from
//! BigQuery and writes back to the same bucket:
//!
//! ```text
//! datasets_tables_tf_config/{base}_{timestamp}/datasets_tables_tf_config.tf
//! table_schema_jsons/{base}_{timestamp}/{dataset}/{table}.json
//! ```

pub mod config;
pub mod error;
pub mod runner;
pub mod schema_json;
pub mod sheet;
pub mod tfconfig;
pub mod trigger;

// Re-exports for convenience
pub use config::Config;
pub use error::{GenerateError, Stage};
pub use runner::{GenerateSummary, Generator, Outcome, run_timestamp};
pub use sheet::{SheetRow, classify_row, load_rows};
pub use tfconfig::ConfigDocument;
pub use trigger::{Trigger, TriggerEvent, classify_trigger};
