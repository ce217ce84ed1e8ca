//! Terraform config document: dataset and table module blocks

use bqline_gcp::{Partitioning, RangePartitioning, TableMetadata, TimePartitioning};

/// The two module blocks of the generated config, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Datasets,
    Tables,
}

impl Module {
    fn header(self, source: &str) -> String {
        match self {
            Self::Datasets => format!(
                r#"module "ssot_raw_datasets" {{
  source = "{source}"

  project_id                = var.project
  delete_content_on_destroy = true
  deletion_protection       = false

  datasets = [
"#
            ),
            Self::Tables => format!(
                r#"module "ssot_raw_datasets_tables" {{
  source                    = "{source}"
  project_id                = var.project
  delete_content_on_destroy = false
  #depends_on = [module.ssot_raw_datasets]
  deletion_protection = false

  tables = [
"#
            ),
        }
    }
}

const MODULE_FOOTER: &str = "  ]\n}\n";

/// Append-only config text.
///
/// A module block is opened by its first entry and closed when the next
/// module starts or the document is finished, so a module without
/// entries never appears.
#[derive(Debug)]
pub struct ConfigDocument {
    text: String,
    module_source: String,
    open: Option<Module>,
    datasets: usize,
    tables: usize,
}

impl ConfigDocument {
    pub fn new(module_source: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            module_source: module_source.into(),
            open: None,
            datasets: 0,
            tables: 0,
        }
    }

    pub fn push_dataset(&mut self, dataset_id: &str) {
        self.push(Module::Datasets, &dataset_entry(dataset_id));
        self.datasets += 1;
    }

    pub fn push_table(&mut self, dataset_id: &str, table_id: &str, meta: &TableMetadata) {
        self.push(Module::Tables, &table_entry(dataset_id, table_id, meta));
        self.tables += 1;
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets
    }

    pub fn table_count(&self) -> usize {
        self.tables
    }

    /// Close any open module and return the text
    pub fn finish(mut self) -> String {
        self.close();
        self.text
    }

    fn push(&mut self, module: Module, entry: &str) {
        if self.open != Some(module) {
            self.close();
            self.text.push_str(&module.header(&self.module_source));
            self.open = Some(module);
        }
        self.text.push_str(entry);
    }

    fn close(&mut self) {
        if self.open.take().is_some() {
            trim_trailing_separator(&mut self.text);
            self.text.push_str(MODULE_FOOTER);
        }
    }
}

/// Dataset ids are rendered into quoted HCL strings, so only BigQuery's
/// own alphabet (letters, digits, underscore; at most 1024) is accepted.
pub fn validate_dataset_id(dataset_id: &str) -> anyhow::Result<()> {
    let valid = !dataset_id.is_empty()
        && dataset_id.len() <= 1024
        && dataset_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    anyhow::ensure!(valid, "Invalid dataset id {dataset_id:?}");
    Ok(())
}

/// Drop one `,` at the very end of `text`, or just before its final newline.
pub fn trim_trailing_separator(text: &mut String) {
    let len = text.len();
    if text.ends_with(",\n") {
        text.remove(len - 2);
    } else if text.ends_with(',') {
        text.pop();
    }
}

pub fn dataset_entry(dataset_id: &str) -> String {
    format!(
        r#"    {{
      dataset_id    = "{dataset_id}"
      friendly_name = "dataset for {dataset_id}"
      location      = var.location
      labels        = merge(var.baselabels, {{ resource_name = "{dataset_id}"}})
    }},
"#
    )
}

pub fn table_entry(dataset_id: &str, table_id: &str, meta: &TableMetadata) -> String {
    let expiration = meta
        .expiration_ms
        .map_or_else(|| "null".to_string(), |ms| ms.to_string());
    format!(
        r#"    {{
      table_id            = "{table_id}"
      dataset_id          = "{dataset_id}"
      schema              = "${{path.module}}/json/{dataset_id}/{table_id}.json"
      {range}
      expiration_time     = {expiration}
      deletion_protection = false
      {time}
      clustering = {clustering}
      labels = merge(var.baselabels, {{ resource_name = lower("{table_id}") }})
    }},
"#,
        range = range_block(&meta.range_partitioning),
        time = time_block(&meta.time_partitioning),
        clustering = clustering(meta.clustering_fields.as_deref()),
    )
}

fn flag(value: Option<bool>) -> String {
    value.map_or_else(|| "null".to_string(), |b| b.to_string())
}

fn time_block(partitioning: &Partitioning<TimePartitioning>) -> String {
    match partitioning {
        Partitioning::Absent => "time_partitioning =  null".to_string(),
        Partitioning::Present(tp) => format!(
            r#"time_partitioning =  {{
        type           = "{kind}"
        field          = "{field}"
        expiration_ms  = {expiration}
        require_partition_filter = {filter}
        }}"#,
            kind = tp.kind,
            field = tp.field,
            expiration = tp
                .expiration_ms
                .map_or_else(|| "null".to_string(), |ms| ms.to_string()),
            filter = flag(tp.require_partition_filter),
        ),
    }
}

fn range_block(partitioning: &Partitioning<RangePartitioning>) -> String {
    match partitioning {
        Partitioning::Absent => "range_partitioning =  null".to_string(),
        Partitioning::Present(rp) => format!(
            r#"range_partitioning =  {{
        field          = "{field}"
        require_partition_filter = {filter}
          range = {{
          start    = {start}
          end      = {end}
          interval = {interval}
          }}
        }}"#,
            field = rp.field,
            filter = flag(rp.require_partition_filter),
            start = rp.start,
            end = rp.end,
            interval = rp.interval,
        ),
    }
}

/// JSON list literal (`["a", "b"]`), valid HCL as-is
fn clustering(fields: Option<&[String]>) -> String {
    match fields {
        None => "null".to_string(),
        Some(fields) => {
            let quoted: Vec<String> = fields
                .iter()
                .map(|f| serde_json::Value::from(f.as_str()).to_string())
                .collect();
            format!("[{}]", quoted.join(", "))
        }
    }
}
