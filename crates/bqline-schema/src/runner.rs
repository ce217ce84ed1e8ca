//! Event handling and the generation run

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use bqline_core::ProgressContext;
use bqline_gcp::{ObjectStorage, TableMetadata, TableRef, Warehouse};

use crate::config::Config;
use crate::error::{GenerateError, Stage, StageExt};
use crate::schema_json::{config_object_path, render_schema, schema_object_path};
use crate::sheet::{SheetRow, classify_row, load_rows};
use crate::tfconfig::ConfigDocument;
use crate::trigger::{Trigger, TriggerEvent, classify_trigger};

/// Local wall-clock stamp shared by every object of one run
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S%6f").to_string()
}

/// What an event led to
#[derive(Debug)]
pub enum Outcome {
    Generated(GenerateSummary),
    /// Not a spreadsheet we generate from; nothing was written
    Skipped(Trigger),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub datasets: usize,
    pub tables: usize,
    pub schema_files: usize,
    pub malformed_rows: usize,
    pub config_object: String,
    pub elapsed: Duration,
}

impl GenerateSummary {
    pub fn log(&self) {
        log::info!("=== Generate Summary ===");
        log::info!(
            "Config: {} datasets, {} tables -> {}",
            self.datasets,
            self.tables,
            self.config_object
        );
        log::info!("Schema files: {}", self.schema_files);
        if self.malformed_rows > 0 {
            log::info!("Skipped rows: {}", self.malformed_rows);
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

/// Generates config and schema objects for one bucket's spreadsheets.
pub struct Generator<'a> {
    config: &'a Config,
    storage: &'a dyn ObjectStorage,
    warehouse: &'a dyn Warehouse,
    progress: &'a ProgressContext,
    timestamp: String,
}

impl<'a> Generator<'a> {
    pub fn new(
        config: &'a Config,
        storage: &'a dyn ObjectStorage,
        warehouse: &'a dyn Warehouse,
        progress: &'a ProgressContext,
    ) -> Self {
        Self {
            config,
            storage,
            warehouse,
            progress,
            timestamp: run_timestamp(),
        }
    }

    /// Fix the run timestamp instead of reading the clock
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Classify the event's object and, for a top-level spreadsheet,
    /// download it and run [`Generator::generate`].
    pub fn handle_event(&self, event: &TriggerEvent) -> Result<Outcome, GenerateError> {
        let base_name = match classify_trigger(&event.name) {
            Trigger::Spreadsheet { base_name } => base_name,
            Trigger::GeneratedArtifact => {
                log::info!("{} is a generated file, ignoring", event.name);
                return Ok(Outcome::Skipped(Trigger::GeneratedArtifact));
            }
            Trigger::Unsupported => {
                log::info!(
                    "{} is not a top-level .xlsx/.xls file, ignoring",
                    event.name
                );
                return Ok(Outcome::Skipped(Trigger::Unsupported));
            }
        };

        let rows = self.fetch_rows(event).stage(Stage::Generate)?;
        self.generate(&event.bucket, &base_name, &rows)
            .map(Outcome::Generated)
    }

    fn fetch_rows(&self, event: &TriggerEvent) -> anyhow::Result<Vec<Vec<String>>> {
        let dir = tempfile::tempdir().context("Cannot create download directory")?;
        let local = dir.path().join(&event.name);
        self.storage
            .download(&event.bucket, &event.name, &local)
            .with_context(|| format!("Cannot download gs://{}/{}", event.bucket, event.name))?;
        let rows = load_rows(&local)?;
        log::info!("Read {} rows from {}", rows.len(), event.name);
        Ok(rows)
    }

    /// Build the config from spreadsheet `rows`, upload it, then write one
    /// schema object per listed table.
    pub fn generate(
        &self,
        bucket: &str,
        base_name: &str,
        rows: &[Vec<String>],
    ) -> Result<GenerateSummary, GenerateError> {
        let start = Instant::now();
        if self.config.project.is_empty() {
            return Err(GenerateError {
                stage: Stage::Generate,
                source: anyhow!("No BigQuery project configured"),
            });
        }
        log::info!(
            "Generating dataset and table config from project {}",
            self.config.project
        );

        let sheet: Vec<SheetRow> = rows.iter().map(|r| classify_row(r)).collect();
        let malformed_rows = sheet
            .iter()
            .filter(|r| matches!(r, SheetRow::Malformed))
            .count();
        if malformed_rows > 0 {
            log::warn!("{malformed_rows} rows have no usable dataset id, skipped");
        }

        let mut doc = ConfigDocument::new(self.config.module_source.as_str());

        for dataset_id in sheet.iter().filter_map(SheetRow::dataset_id) {
            doc.push_dataset(dataset_id);
            log::info!("Dataset {dataset_id} added");
        }

        let described = self.describe_tables(&sheet, &mut doc).stage(Stage::Tables)?;

        let datasets = doc.dataset_count();
        let tables = doc.table_count();
        if datasets == 0 {
            log::warn!("No datasets found in {base_name}");
        }
        let config_object = config_object_path(base_name, &self.timestamp);
        self.upload_config(bucket, &config_object, &doc.finish())
            .stage(Stage::Upload)?;

        let schema_files = self
            .write_schemas(bucket, base_name, &described)
            .stage(Stage::Schema)?;

        let summary = GenerateSummary {
            datasets,
            tables,
            schema_files,
            malformed_rows,
            config_object,
            elapsed: start.elapsed(),
        };
        summary.log();
        Ok(summary)
    }

    /// Fetch metadata for every listed table and append its config entry
    fn describe_tables(
        &self,
        sheet: &[SheetRow],
        doc: &mut ConfigDocument,
    ) -> anyhow::Result<Vec<(TableRef, TableMetadata)>> {
        let pb = self.progress.stage_line("tables");
        let mut described = Vec::new();
        for row in sheet {
            match row {
                SheetRow::DatasetTables {
                    dataset_id,
                    table_ids,
                } => {
                    for table_id in table_ids {
                        let table = TableRef::new(&self.config.project, dataset_id, table_id);
                        pb.set_message(table.to_string());
                        let meta = self
                            .warehouse
                            .get_table(&table)
                            .with_context(|| format!("Cannot describe {table}"))?;
                        doc.push_table(dataset_id, table_id, &meta);
                        log::info!("Table {table} added");
                        described.push((table, meta));
                    }
                }
                SheetRow::Dataset { dataset_id } => {
                    log::info!("No table mentioned for dataset {dataset_id}");
                }
                SheetRow::Header | SheetRow::Malformed => {}
            }
        }
        pb.finish_and_clear();
        Ok(described)
    }

    /// Write the config to a private temp file, upload it, remove it
    fn upload_config(&self, bucket: &str, object: &str, text: &str) -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("datasets_tables_tf_config")
            .suffix(".tf")
            .tempfile()
            .context("Cannot create temp config file")?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .context("Cannot write temp config file")?;

        self.storage
            .upload_file(bucket, object, file.path())
            .with_context(|| format!("Cannot upload gs://{bucket}/{object}"))?;
        log::info!("Uploaded config to gs://{bucket}/{object}");

        file.close().context("Cannot remove temp config file")
    }

    fn write_schemas(
        &self,
        bucket: &str,
        base_name: &str,
        described: &[(TableRef, TableMetadata)],
    ) -> anyhow::Result<usize> {
        let pb = self.progress.stage_line("schema");
        for (table, meta) in described {
            let object =
                schema_object_path(base_name, &self.timestamp, &table.dataset, &table.table);
            pb.set_message(object.clone());
            let text = render_schema(&meta.schema_fields)
                .with_context(|| format!("Cannot render schema of {table}"))?;
            self.storage
                .write_object(bucket, &object, text.into_bytes(), "application/json")
                .with_context(|| format!("Cannot write gs://{bucket}/{object}"))?;
            log::info!("{object} created for {table}");
        }
        pb.finish_and_clear();
        Ok(described.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_microseconds() {
        let ts = run_timestamp();
        // 20240101_120000 + 6 fractional digits
        assert_eq!(ts.len(), 21);
        assert_eq!(ts.as_bytes()[8], b'_');
        assert!(ts.bytes().filter(|b| *b != b'_').all(|b| b.is_ascii_digit()));
    }
}
