//! Spreadsheet reading and row classification

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};

use crate::tfconfig::validate_dataset_id;

/// Meaning of one spreadsheet row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRow {
    /// Column title row (`DATASET` in the first cell)
    Header,
    /// Dataset without tables
    Dataset { dataset_id: String },
    /// Dataset plus the tables to describe
    DatasetTables {
        dataset_id: String,
        table_ids: Vec<String>,
    },
    /// First cell empty or not a valid dataset id
    Malformed,
}

impl SheetRow {
    pub fn dataset_id(&self) -> Option<&str> {
        match self {
            Self::Dataset { dataset_id } | Self::DatasetTables { dataset_id, .. } => {
                Some(dataset_id)
            }
            Self::Header | Self::Malformed => None,
        }
    }

    pub fn table_ids(&self) -> &[String] {
        match self {
            Self::DatasetTables { table_ids, .. } => table_ids,
            _ => &[],
        }
    }
}

/// Classify a row by its first two cells.
///
/// A first cell that is not a valid dataset id never reaches the config
/// text; the row is logged and treated as malformed.
pub fn classify_row(cells: &[String]) -> SheetRow {
    let first = cells.first().map(|c| c.trim()).unwrap_or_default();
    if first.eq_ignore_ascii_case("DATASET") {
        return SheetRow::Header;
    }
    if first.is_empty() {
        return SheetRow::Malformed;
    }
    if let Err(e) = validate_dataset_id(first) {
        log::warn!("Skipping row {cells:?}: {e:#}");
        return SheetRow::Malformed;
    }

    let table_ids: Vec<String> = cells
        .get(1)
        .map(|c| {
            c.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    if table_ids.is_empty() {
        SheetRow::Dataset {
            dataset_id: first.to_string(),
        }
    } else {
        SheetRow::DatasetTables {
            dataset_id: first.to_string(),
            table_ids,
        }
    }
}

/// Text of a cell as the generator sees it. Integral floats drop the
/// fractional part so a numeric id `2024` stays `2024`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Read every row of the first worksheet as text cells.
///
/// Columns are aligned to column A even when the used range starts
/// further right.
pub fn load_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Cannot open spreadsheet {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .with_context(|| format!("{} has no worksheets", path.display()))?
        .with_context(|| format!("Cannot read first worksheet of {}", path.display()))?;

    let offset = range.start().map_or(0, |(_, col)| col as usize);
    let rows = range
        .rows()
        .map(|row| {
            std::iter::repeat(String::new())
                .take(offset)
                .chain(row.iter().map(cell_text))
                .collect()
        })
        .collect();
    Ok(rows)
}
