//! CSV / XLSX dataset loader

use crate::error::{FloodError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Loads a tabular dataset and returns it with clean headers and no missing values
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    /// Rows scanned for CSV schema inference; `None` scans the whole file
    infer_schema_length: Option<usize>,
    drop_missing: bool,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
            drop_missing: true,
        }
    }

    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Keep rows with nulls (used by `describe`, never by training)
    pub fn with_drop_missing(mut self, drop: bool) -> Self {
        self.drop_missing = drop;
        self
    }

    /// Load a CSV or spreadsheet file, dispatching on the extension
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FloodError::DataLoad(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let start = Instant::now();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let raw = match extension.as_str() {
            "xlsx" | "xls" | "xlsm" | "ods" => self.read_spreadsheet(path)?,
            _ => self.read_csv(path)?,
        };

        let mut df = normalize_columns(raw)?;

        if self.drop_missing {
            let before = df.height();
            df = df.drop_nulls::<String>(None)?;
            let dropped = before - df.height();
            if dropped > 0 {
                info!(dropped, remaining = df.height(), "Dropped rows with missing values");
            }
        }

        if df.height() == 0 {
            return Err(FloodError::DataLoad(format!(
                "{} contains no usable rows",
                path.display()
            )));
        }

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );
        Ok(df)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| FloodError::DataLoad(format!("cannot read {}: {}", path.display(), e)))
    }

    /// First worksheet, first row as header. A column whose non-empty cells
    /// are all numeric becomes Float64, anything else becomes String.
    fn read_spreadsheet(&self, path: &Path) -> Result<DataFrame> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            FloodError::DataLoad(format!("{} has no worksheets", path.display()))
        })??;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(cells) => cells.iter().map(|c| c.to_string()).collect(),
            None => {
                return Err(FloodError::DataLoad(format!(
                    "{} has an empty first worksheet",
                    path.display()
                )))
            }
        };
        let body: Vec<&[Data]> = rows.collect();
        debug!(columns = header.len(), rows = body.len(), "Read worksheet");

        let columns = header
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells: Vec<&Data> = body
                    .iter()
                    .map(|row| row.get(idx).unwrap_or(&Data::Empty))
                    .collect();
                spreadsheet_column(name, &cells)
            })
            .collect::<Vec<_>>();

        DataFrame::new(columns).map_err(|e| {
            FloodError::DataLoad(format!("{} is not tabular: {}", path.display(), e))
        })
    }
}

fn is_missing(cell: &Data) -> bool {
    matches!(cell, Data::Empty | Data::Error(_))
}

fn spreadsheet_column(name: &str, cells: &[&Data]) -> Column {
    let numeric = cells.iter().all(|cell| {
        is_missing(cell) || matches!(cell, Data::Int(_) | Data::Float(_) | Data::Bool(_))
    });

    if numeric {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Int(v) => Some(*v as f64),
                Data::Float(v) => Some(*v),
                Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            })
            .collect();
        Column::new(name.into(), values)
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|cell| {
                if is_missing(cell) {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        Column::new(name.into(), values)
    }
}

fn normalize_columns(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let clean = normalize_header(raw.as_str());
            if clean.is_empty() {
                format!("column {}", idx)
            } else {
                clean
            }
        })
        .collect();

    let mut seen = HashSet::with_capacity(names.len());
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(FloodError::DataLoad(format!(
                "duplicate column '{}' after header normalization",
                name
            )));
        }
    }

    df.set_column_names(names.iter().map(|s| s.as_str()))?;
    Ok(df)
}

/// Clean a raw header: repair mis-decoded characters, drop a trailing
/// `(unit)` suffix and collapse non-alphanumeric runs into single spaces.
///
/// `"Temperature (Â°C)"` becomes `"Temperature"`, `"River Discharge (m³/s)"`
/// becomes `"River Discharge"`.
pub fn normalize_header(raw: &str) -> String {
    let repaired = raw.replace('Â', "").replace('³', "3").replace('²', "2");
    let stripped = strip_unit_suffix(repaired.trim());

    stripped
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_unit_suffix(name: &str) -> &str {
    if name.ends_with(')') {
        if let Some(open) = name.rfind('(') {
            let head = name[..open].trim_end();
            if !head.is_empty() {
                return head;
            }
        }
    }
    name
}
