//! Table schema files and generated object paths

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::trigger::{CONFIG_PREFIX, SCHEMA_PREFIX};

/// Removed verbatim from every schema file; NULLABLE is the default mode.
pub const NULLABLE_MODE: &str = r#""mode": "NULLABLE","#;

/// Serialize schema fields as a 2-space indented array with sorted keys,
/// then strip every default mode.
pub fn render_schema(fields: &[Value]) -> Result<String> {
    let sorted = Value::Array(fields.iter().map(sort_keys).collect());
    let text = serde_json::to_string_pretty(&sorted).context("Cannot serialize table schema")?;
    Ok(strip_nullable_mode(&text))
}

/// Plain substring removal of [`NULLABLE_MODE`]
pub fn strip_nullable_mode(text: &str) -> String {
    text.replace(NULLABLE_MODE, "")
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// `datasets_tables_tf_config/{base}_{timestamp}/datasets_tables_tf_config.tf`
pub fn config_object_path(base_name: &str, timestamp: &str) -> String {
    format!("{CONFIG_PREFIX}/{base_name}_{timestamp}/{CONFIG_PREFIX}.tf")
}

/// `table_schema_jsons/{base}_{timestamp}/{dataset}/{table}.json`
pub fn schema_object_path(base_name: &str, timestamp: &str, dataset: &str, table: &str) -> String {
    format!("{SCHEMA_PREFIX}/{base_name}_{timestamp}/{dataset}/{table}.json")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_only_nullable_mode() {
        let text = "{\n  \"mode\": \"NULLABLE\",\n  \"name\": \"a\"\n}";
        assert_eq!(strip_nullable_mode(text), "{\n  \n  \"name\": \"a\"\n}");

        let required = r#"{"mode": "REQUIRED", "name": "a"}"#;
        assert_eq!(strip_nullable_mode(required), required);

        // No trailing comma, not the literal
        let last = r#"{"name": "a", "mode": "NULLABLE"}"#;
        assert_eq!(strip_nullable_mode(last), last);
    }

    #[test]
    fn render_sorts_keys_and_strips() {
        let fields = vec![
            json!({"name": "id", "type": "INTEGER", "mode": "REQUIRED"}),
            json!({"type": "STRING", "name": "text", "mode": "NULLABLE", "description": "body"}),
            json!({
                "name": "user",
                "type": "RECORD",
                "mode": "NULLABLE",
                "fields": [{"type": "INTEGER", "mode": "NULLABLE", "name": "id"}]
            }),
        ];
        let text = render_schema(&fields).unwrap();

        assert!(!text.contains("NULLABLE"));
        assert!(text.contains(r#""mode": "REQUIRED","#));
        let desc = text.find("\"description\"").unwrap();
        let name = text.find("\"name\": \"text\"").unwrap();
        assert!(desc < name);
        assert!(text.starts_with("[\n  {\n"));

        // Still valid JSON, with the default mode gone
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[1].get("mode"), None);
        assert_eq!(parsed[2]["fields"][0]["name"], "id");
        assert_eq!(parsed[0]["mode"], "REQUIRED");
    }

    #[test]
    fn empty_schema() {
        assert_eq!(render_schema(&[]).unwrap(), "[]");
    }

    #[test]
    fn object_paths() {
        assert_eq!(
            config_object_path("tables", "20240101_120000123456"),
            "datasets_tables_tf_config/tables_20240101_120000123456/datasets_tables_tf_config.tf"
        );
        assert_eq!(
            schema_object_path("tables", "20240101_120000123456", "ds1", "t1"),
            "table_schema_jsons/tables_20240101_120000123456/ds1/t1.json"
        );
    }
}
