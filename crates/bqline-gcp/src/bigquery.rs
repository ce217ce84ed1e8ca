//! BigQuery client: table metadata lookup and streaming inserts

use anyhow::{Context, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::GoogleAuth;
use crate::rest::{Body, encode_segment, send_json};

const BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Fully-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    fn resource_path(&self) -> String {
        format!(
            "projects/{}/datasets/{}/tables/{}",
            encode_segment(&self.project),
            encode_segment(&self.dataset),
            encode_segment(&self.table)
        )
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Optional partitioning descriptor. Absence is an ordinary outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partitioning<T> {
    Present(T),
    Absent,
}

impl<T> Default for Partitioning<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Partitioning<T> {
    pub fn as_present(&self) -> Option<&T> {
        match self {
            Self::Present(p) => Some(p),
            Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl<T> From<Option<T>> for Partitioning<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

/// Time-unit column partitioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePartitioning {
    /// DAY, HOUR, MONTH or YEAR
    pub kind: String,
    pub field: String,
    pub expiration_ms: Option<i64>,
    pub require_partition_filter: Option<bool>,
}

/// Integer-range partitioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePartitioning {
    pub field: String,
    pub start: i64,
    pub end: i64,
    pub interval: i64,
    pub require_partition_filter: Option<bool>,
}

/// The slice of a table resource the schema generator renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableMetadata {
    /// Expiration as epoch milliseconds
    pub expiration_ms: Option<i64>,
    pub clustering_fields: Option<Vec<String>>,
    pub time_partitioning: Partitioning<TimePartitioning>,
    pub range_partitioning: Partitioning<RangePartitioning>,
    /// Schema fields exactly as the API returned them
    pub schema_fields: Vec<Value>,
}

/// BigQuery encodes int64 as JSON strings; accept both forms.
fn int64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl TableMetadata {
    /// Extract metadata from a `tables.get` resource.
    ///
    /// A partitioning block missing entirely, or missing its field or
    /// range bounds, yields [`Partitioning::Absent`].
    pub fn from_resource(resource: &Value) -> Self {
        let table_filter = resource.get("requirePartitionFilter").and_then(Value::as_bool);

        let time_partitioning: Partitioning<TimePartitioning> = resource
            .get("timePartitioning")
            .and_then(|tp| {
                Some(TimePartitioning {
                    kind: non_empty_str(tp.get("type")).unwrap_or_else(|| "DAY".to_string()),
                    field: non_empty_str(tp.get("field"))?,
                    expiration_ms: int64(tp.get("expirationMs")),
                    require_partition_filter: tp
                        .get("requirePartitionFilter")
                        .and_then(Value::as_bool)
                        .or(table_filter),
                })
            })
            .into();

        let range_partitioning: Partitioning<RangePartitioning> = resource
            .get("rangePartitioning")
            .and_then(|rp| {
                let range = rp.get("range")?;
                Some(RangePartitioning {
                    field: non_empty_str(rp.get("field"))?,
                    start: int64(range.get("start"))?,
                    end: int64(range.get("end"))?,
                    interval: int64(range.get("interval"))?,
                    require_partition_filter: table_filter,
                })
            })
            .into();

        let clustering_fields = resource
            .pointer("/clustering/fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            });

        let schema_fields = resource
            .pointer("/schema/fields")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            expiration_ms: int64(resource.get("expirationTime")),
            clustering_fields,
            time_partitioning,
            range_partitioning,
            schema_fields,
        }
    }
}

/// Per-row failure reported by a streaming insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertError {
    pub index: usize,
    pub messages: Vec<String>,
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.index, self.messages.join("; "))
    }
}

/// Warehouse operations both pipelines need.
pub trait Warehouse {
    fn get_table(&self, table: &TableRef) -> Result<TableMetadata>;

    /// Stream rows into `table`. An empty result means every row landed.
    ///
    /// Row `i` carries the insert id `{batch_id}-{i}`, so resending the
    /// same batch (a retried request or a redelivered message) lets the
    /// warehouse drop the duplicates.
    fn insert_rows(
        &self,
        table: &TableRef,
        batch_id: &str,
        rows: &[Value],
    ) -> Result<Vec<InsertError>>;
}

/// `tabledata.insertAll` request body
fn insert_all_request(batch_id: &str, rows: &[Value]) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| json!({ "insertId": format!("{batch_id}-{i}"), "json": row }))
        .collect();
    json!({
        "kind": "bigquery#tableDataInsertAllRequest",
        "rows": rows,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<WireInsertError>,
}

#[derive(Deserialize)]
struct WireInsertError {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    errors: Vec<WireErrorProto>,
}

#[derive(Deserialize)]
struct WireErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

fn decode_insert_errors(resp: InsertAllResponse) -> Vec<InsertError> {
    resp.insert_errors
        .into_iter()
        .map(|e| InsertError {
            index: e.index,
            messages: e
                .errors
                .into_iter()
                .map(|p| format!("{}: {}", p.reason, p.message))
                .collect(),
        })
        .collect()
}

/// BigQuery v2 REST client
pub struct BigQueryClient<'a> {
    auth: &'a GoogleAuth,
}

impl<'a> BigQueryClient<'a> {
    pub fn new(auth: &'a GoogleAuth) -> Self {
        Self { auth }
    }
}

impl Warehouse for BigQueryClient<'_> {
    fn get_table(&self, table: &TableRef) -> Result<TableMetadata> {
        let url = format!("{BIGQUERY_URL}/{}", table.resource_path());
        let resource: Value = send_json(
            self.auth,
            Method::GET,
            &url,
            Body::Empty,
            &format!("get table {table}"),
        )?;
        Ok(TableMetadata::from_resource(&resource))
    }

    fn insert_rows(
        &self,
        table: &TableRef,
        batch_id: &str,
        rows: &[Value],
    ) -> Result<Vec<InsertError>> {
        let url = format!("{BIGQUERY_URL}/{}/insertAll", table.resource_path());
        let body = insert_all_request(batch_id, rows);
        let resp: InsertAllResponse = send_json(
            self.auth,
            Method::POST,
            &url,
            Body::Json(&body),
            &format!("insert into {table}"),
        )
        .with_context(|| format!("Streaming insert of {} rows failed", rows.len()))?;
        Ok(decode_insert_errors(resp))
    }
}
