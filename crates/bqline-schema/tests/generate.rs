//! Generation runs against in-memory storage and warehouse fakes

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Result, bail};
use bqline_core::ProgressContext;
use bqline_gcp::{
    InsertError, ObjectStorage, Partitioning, TableMetadata, TableRef, TimePartitioning, Warehouse,
};
use bqline_schema::{Config, Generator, Outcome, Stage, Trigger, TriggerEvent};
use serde_json::{Value, json};

const TS: &str = "20240102_030405123456";

/// Bucket contents keyed by object name
#[derive(Default)]
struct MemoryStorage {
    objects: RefCell<BTreeMap<String, Vec<u8>>>,
    downloads: RefCell<usize>,
    fail_writes_under: Option<&'static str>,
}

impl MemoryStorage {
    fn with_object(name: &str, data: &[u8]) -> Self {
        let storage = Self::default();
        storage
            .objects
            .borrow_mut()
            .insert(name.to_string(), data.to_vec());
        storage
    }

    fn text(&self, name: &str) -> String {
        let objects = self.objects.borrow();
        String::from_utf8(objects[name].clone()).unwrap()
    }

    fn names(&self) -> Vec<String> {
        self.objects.borrow().keys().cloned().collect()
    }
}

impl ObjectStorage for MemoryStorage {
    fn download(&self, _bucket: &str, object: &str, dest: &Path) -> Result<()> {
        *self.downloads.borrow_mut() += 1;
        let Some(data) = self.objects.borrow().get(object).cloned() else {
            bail!("HTTP 404: No such object: {object}");
        };
        std::fs::write(dest, data)?;
        Ok(())
    }

    fn write_object(
        &self,
        _bucket: &str,
        object: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        if let Some(prefix) = self.fail_writes_under {
            if object.starts_with(prefix) {
                bail!("HTTP 503: backend unavailable");
            }
        }
        self.objects.borrow_mut().insert(object.to_string(), data);
        Ok(())
    }
}

/// Table metadata keyed by `dataset.table`
#[derive(Default)]
struct FakeWarehouse {
    tables: HashMap<String, TableMetadata>,
}

impl FakeWarehouse {
    fn with_tables(names: &[&str]) -> Self {
        let tables = names
            .iter()
            .map(|name| (name.to_string(), metadata(name)))
            .collect();
        Self { tables }
    }
}

impl Warehouse for FakeWarehouse {
    fn get_table(&self, table: &TableRef) -> Result<TableMetadata> {
        let key = format!("{}.{}", table.dataset, table.table);
        match self.tables.get(&key) {
            Some(meta) => Ok(meta.clone()),
            None => bail!("HTTP 404: Not found: Table {table}"),
        }
    }

    fn insert_rows(
        &self,
        _table: &TableRef,
        _batch_id: &str,
        _rows: &[Value],
    ) -> Result<Vec<InsertError>> {
        Ok(Vec::new())
    }
}

fn metadata(name: &str) -> TableMetadata {
    let mut meta = TableMetadata {
        schema_fields: vec![
            json!({"name": "id", "type": "INTEGER", "mode": "REQUIRED"}),
            json!({"name": "payload", "type": "STRING", "mode": "NULLABLE"}),
        ],
        ..Default::default()
    };
    if name.ends_with("t1") {
        meta.time_partitioning = Partitioning::Present(TimePartitioning {
            kind: "DAY".into(),
            field: "ingested_at".into(),
            expiration_ms: None,
            require_partition_filter: Some(false),
        });
        meta.clustering_fields = Some(vec!["id".into()]);
    }
    meta
}

fn config() -> Config {
    Config {
        project: "sandbox".into(),
        ..Default::default()
    }
}

fn rows(cells: &[(&str, &str)]) -> Vec<Vec<String>> {
    cells
        .iter()
        .map(|(a, b)| vec![a.to_string(), b.to_string()])
        .collect()
}

/// First-sheet workbook bytes; empty cells are left unwritten
fn xlsx(cells: &[(&str, &str)]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (row, (a, b)) in (0u32..).zip(cells) {
        for (col, text) in [(0u16, a), (1, b)] {
            if !text.is_empty() {
                sheet.write_string(row, col, *text).unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn config_object() -> String {
    format!("datasets_tables_tf_config/tables_{TS}/datasets_tables_tf_config.tf")
}

#[test]
fn generates_config_and_schemas_for_listed_tables() {
    let storage = MemoryStorage::default();
    let warehouse = FakeWarehouse::with_tables(&["ds1.t1", "ds1.t2"]);
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);

    let summary = generator
        .generate(
            "bucket",
            "tables",
            &rows(&[("DATASET", ""), ("ds1", "t1,t2"), ("ds2", "")]),
        )
        .unwrap();

    assert_eq!(summary.datasets, 2);
    assert_eq!(summary.tables, 2);
    assert_eq!(summary.schema_files, 2);
    assert_eq!(summary.config_object, config_object());

    assert_eq!(
        storage.names(),
        vec![
            config_object(),
            format!("table_schema_jsons/tables_{TS}/ds1/t1.json"),
            format!("table_schema_jsons/tables_{TS}/ds1/t2.json"),
        ]
    );

    let tf = storage.text(&config_object());
    assert_eq!(tf.matches("friendly_name").count(), 2);
    assert_eq!(tf.matches("table_id ").count(), 2);
    assert!(!tf.contains("DATASET"));
    assert!(!tf.contains(",\n  ]"));
    assert!(tf.contains(r#"field          = "ingested_at""#));
    assert!(tf.contains(r#"clustering = ["id"]"#));
    // t2 has no partitioning at all
    assert_eq!(tf.matches("time_partitioning =  null").count(), 1);
    assert_eq!(tf.matches("range_partitioning =  null").count(), 2);

    let schema = storage.text(&format!("table_schema_jsons/tables_{TS}/ds1/t1.json"));
    assert!(!schema.contains("NULLABLE"));
    assert!(schema.contains(r#""mode": "REQUIRED","#));
}

#[test]
fn datasets_without_tables_write_no_schemas() {
    let storage = MemoryStorage::default();
    let warehouse = FakeWarehouse::default();
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);

    let summary = generator
        .generate("bucket", "tables", &rows(&[("ds1", ""), ("", "orphan"), ("ds2", " ")]))
        .unwrap();

    assert_eq!((summary.datasets, summary.tables), (2, 0));
    assert_eq!(summary.malformed_rows, 1);
    assert_eq!(storage.names(), vec![config_object()]);
    assert!(!storage.text(&config_object()).contains("ssot_raw_datasets_tables"));
}

#[test]
fn missing_table_fails_tables_stage_before_upload() {
    let storage = MemoryStorage::default();
    let warehouse = FakeWarehouse::with_tables(&["ds1.t1"]);
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);

    let err = generator
        .generate("bucket", "tables", &rows(&[("ds1", "t1,missing")]))
        .unwrap_err();

    assert_eq!(err.stage, Stage::Tables);
    assert_eq!(err.exit_code(), 102);
    assert!(err.to_string().contains("sandbox.ds1.missing"));
    assert!(storage.names().is_empty());
}

#[test]
fn invalid_dataset_id_row_is_skipped() {
    let storage = MemoryStorage::default();
    let warehouse = FakeWarehouse::with_tables(&["ds1.t1"]);
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);

    let summary = generator
        .generate(
            "bucket",
            "tables",
            &rows(&[
                ("Dataset Name", "Tables"),
                ("raw-sales", "t1"),
                ("ds1", "t1"),
            ]),
        )
        .unwrap();

    assert_eq!((summary.datasets, summary.tables), (1, 1));
    assert_eq!(summary.malformed_rows, 2);
    let tf = storage.text(&config_object());
    assert!(!tf.contains("raw-sales"));
    assert!(!tf.contains("Dataset Name"));
    assert_eq!(
        storage.names(),
        vec![
            config_object(),
            format!("table_schema_jsons/tables_{TS}/ds1/t1.json"),
        ]
    );
}

#[test]
fn config_upload_failure_is_upload_stage() {
    let storage = MemoryStorage {
        fail_writes_under: Some("datasets_tables_tf_config/"),
        ..Default::default()
    };
    let warehouse = FakeWarehouse::with_tables(&["ds1.t1"]);
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);

    let err = generator
        .generate("bucket", "tables", &rows(&[("ds1", "t1")]))
        .unwrap_err();
    assert_eq!(err.exit_code(), 104);
    assert!(storage.names().is_empty());
}

#[test]
fn schema_write_failure_is_schema_stage() {
    let storage = MemoryStorage {
        fail_writes_under: Some("table_schema_jsons/"),
        ..Default::default()
    };
    let warehouse = FakeWarehouse::with_tables(&["ds1.t1"]);
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);

    let err = generator
        .generate("bucket", "tables", &rows(&[("ds1", "t1")]))
        .unwrap_err();
    assert_eq!(err.exit_code(), 103);
    // Config went out before schemas
    assert_eq!(storage.names(), vec![config_object()]);
}

#[test]
fn missing_project_fails_generate_stage() {
    let storage = MemoryStorage::default();
    let warehouse = FakeWarehouse::default();
    let config = Config::default();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress);

    let err = generator
        .generate("bucket", "tables", &rows(&[("ds1", "")]))
        .unwrap_err();
    assert_eq!(err.exit_code(), 100);
}

#[test]
fn non_spreadsheet_events_are_skipped() {
    let storage = MemoryStorage::default();
    let warehouse = FakeWarehouse::default();
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress);

    let artifact = TriggerEvent::new("bucket", config_object());
    let nested = TriggerEvent::new("bucket", "inbox/tables.xlsx");
    assert!(matches!(
        generator.handle_event(&artifact),
        Ok(Outcome::Skipped(Trigger::GeneratedArtifact))
    ));
    assert!(matches!(
        generator.handle_event(&nested),
        Ok(Outcome::Skipped(Trigger::Unsupported))
    ));
    assert_eq!(*storage.downloads.borrow(), 0);
}

#[test]
fn missing_spreadsheet_fails_generate_stage() {
    let storage = MemoryStorage::default();
    let warehouse = FakeWarehouse::default();
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress);

    let err = generator
        .handle_event(&TriggerEvent::new("bucket", "tables.xlsx"))
        .unwrap_err();
    assert_eq!(err.stage, Stage::Generate);
    assert_eq!(*storage.downloads.borrow(), 1);
}

#[test]
fn unreadable_spreadsheet_fails_generate_stage() {
    let storage = MemoryStorage::with_object("tables.xlsx", b"not a workbook");
    let warehouse = FakeWarehouse::default();
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress);

    let err = generator
        .handle_event(&TriggerEvent::new("bucket", "tables.xlsx"))
        .unwrap_err();
    assert_eq!(err.exit_code(), 100);
    assert_eq!(storage.names(), vec!["tables.xlsx".to_string()]);
}

#[test]
fn uploaded_workbook_generates_end_to_end() {
    let storage = MemoryStorage::with_object(
        "tables.xlsx",
        &xlsx(&[("DATASET", ""), ("ds1", "t1,t2"), ("ds2", "")]),
    );
    let warehouse = FakeWarehouse::with_tables(&["ds1.t1", "ds1.t2"]);
    let config = config();
    let progress = ProgressContext::hidden();
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);

    let summary = match generator.handle_event(&TriggerEvent::new("bucket", "tables.xlsx")) {
        Ok(Outcome::Generated(summary)) => summary,
        other => panic!("expected a generated run, got {other:?}"),
    };

    assert_eq!((summary.datasets, summary.tables), (2, 2));
    assert_eq!(summary.schema_files, 2);
    assert_eq!(summary.malformed_rows, 0);
    assert_eq!(
        storage.names(),
        vec![
            config_object(),
            format!("table_schema_jsons/tables_{TS}/ds1/t1.json"),
            format!("table_schema_jsons/tables_{TS}/ds1/t2.json"),
            "tables.xlsx".to_string(),
        ]
    );
    let tf = storage.text(&config_object());
    assert!(tf.contains(r#"dataset_id    = "ds2""#));
    assert!(!tf.contains("DATASET"));
}

#[test]
fn workbook_numeric_ids_and_shifted_columns() {
    // Dataset column left empty: the table list must not be read as a dataset
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 1, "orphan_table").unwrap();
    let shifted = workbook.save_to_buffer().unwrap();

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_number(0, 0, 2024.0).unwrap();
    let numeric = workbook.save_to_buffer().unwrap();

    let warehouse = FakeWarehouse::default();
    let config = config();
    let progress = ProgressContext::hidden();

    let storage = MemoryStorage::with_object("shifted.xlsx", &shifted);
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);
    let Outcome::Generated(summary) = generator
        .handle_event(&TriggerEvent::new("bucket", "shifted.xlsx"))
        .unwrap()
    else {
        panic!("expected a generated run");
    };
    assert_eq!((summary.datasets, summary.malformed_rows), (0, 1));

    let storage = MemoryStorage::with_object("numeric.xlsx", &numeric);
    let generator = Generator::new(&config, &storage, &warehouse, &progress).with_timestamp(TS);
    let Outcome::Generated(summary) = generator
        .handle_event(&TriggerEvent::new("bucket", "numeric.xlsx"))
        .unwrap()
    else {
        panic!("expected a generated run");
    };
    assert_eq!(summary.datasets, 1);
    let object = format!("datasets_tables_tf_config/numeric_{TS}/datasets_tables_tf_config.tf");
    assert!(storage.text(&object).contains("\"2024\""));
}
