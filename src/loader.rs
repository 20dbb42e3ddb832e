use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A single cell value extracted from an uploaded file
///
/// Cells are either numeric, textual, or absent. The untagged serde
/// representation keeps the wire format identical to what a JavaScript
/// client produces when it parses the same file (`null`, numbers, strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Empty cell
    Null,

    /// Numeric cell (integers are widened to f64)
    Number(f64),

    /// Anything that is neither empty nor numeric
    Text(String),
}

impl CellValue {
    /// Numeric view of the cell, parsing numeric-looking text as well
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// An uploaded file parsed into rows that all share one column schema
///
/// The first row of the file defines the schema; every data row is padded
/// with nulls (or truncated) to the schema's arity, so `rows[i][j]` always
/// lines up with `columns[j]`.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    /// Ordered column names taken from the header row
    pub columns: Vec<String>,

    /// Data rows, index-aligned with `columns`
    pub rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Ordered set of column names (the dataset's schema)
    pub fn schema(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All values of one column in row order, if the column exists
    pub fn column_values(&self, name: &str) -> Option<Vec<CellValue>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx].clone()).collect())
    }
}

/// Parse an uploaded file into a [`Dataset`]
///
/// Supports `.csv` and `.xlsx` (first worksheet only). The first row is
/// interpreted as the header; every following row becomes a data row. This is
/// a pure transform over the uploaded bytes: nothing is written to disk.
///
/// CSV parsing splits on newlines and then commas. Quoted fields containing
/// commas or newlines are NOT handled; this is a known limitation inherited
/// from the upstream data format, not a guaranteed correctness property.
///
/// # Arguments
/// * `bytes` - Raw content of the uploaded file
/// * `extension` - Declared file extension, without the dot (e.g. "csv")
///
/// # Returns
/// * `Result<Dataset, AppError>` - The parsed dataset or an error
///
/// # Errors
/// * `UnsupportedFormat` when the extension is neither `csv` nor `xlsx`
/// * `EmptyDataset` when the file yields zero data rows
///
/// # Examples
/// ```
/// use plotdash::loader::parse_bytes;
///
/// let dataset = parse_bytes(b"A,B\n1,10\n2,20\n", "csv").unwrap();
/// assert_eq!(dataset.schema(), ["A", "B"]);
/// assert_eq!(dataset.row_count(), 2);
/// ```
pub fn parse_bytes(bytes: &[u8], extension: &str) -> Result<Dataset, AppError> {
    match extension.to_lowercase().as_str() {
        "csv" => from_csv(bytes),
        "xlsx" => from_excel(bytes),
        other => Err(AppError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse CSV bytes into a dataset
///
/// Splits on newlines, then commas. The first non-empty line is the header;
/// blank lines are skipped. Each cell is trimmed and classified as a number,
/// text, or null (empty).
fn from_csv(bytes: &[u8]) -> Result<Dataset, AppError> {
    let text = String::from_utf8_lossy(bytes);

    let mut lines = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());

    let header = match lines.next() {
        Some(line) => line,
        None => return Err(AppError::EmptyDataset),
    };

    let columns: Vec<String> = header
        .split(',')
        .enumerate()
        .map(|(i, name)| {
            let name = name.trim();
            if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        let mut row: Vec<CellValue> = line.split(',').map(classify_cell).collect();
        // Pad or truncate to the schema arity so every row lines up
        row.resize(columns.len(), CellValue::Null);
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(AppError::EmptyDataset);
    }

    Ok(Dataset { columns, rows })
}

/// Parse XLSX bytes into a dataset
///
/// Reads the first worksheet. The first row supplies column names; unnamed
/// header cells get positional names (`column_1`, ...).
fn from_excel(bytes: &[u8]) -> Result<Dataset, AppError> {
    use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};

    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor)
        .map_err(|e| AppError::Validation(format!("failed to open xlsx workbook: {}", e)))?;

    // First worksheet only
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(AppError::EmptyDataset)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::Validation(format!("failed to read worksheet: {}", e)))?;

    let mut row_iter = range.rows();

    let header = match row_iter.next() {
        Some(row) => row,
        None => return Err(AppError::EmptyDataset),
    };

    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("column_{}", i + 1),
            other => {
                let name = other.to_string();
                let name = name.trim();
                if name.is_empty() {
                    format!("column_{}", i + 1)
                } else {
                    name.to_string()
                }
            }
        })
        .collect();

    let mut rows = Vec::new();
    for row in row_iter {
        let mut record: Vec<CellValue> = row.iter().map(excel_cell).collect();
        record.resize(columns.len(), CellValue::Null);
        rows.push(record);
    }

    if rows.is_empty() {
        return Err(AppError::EmptyDataset);
    }

    Ok(Dataset { columns, rows })
}

// Classify one CSV cell: empty -> null, numeric -> number, else text
fn classify_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(trimmed.to_string()),
    }
}

// Map a calamine cell onto our value model
fn excel_cell(cell: &calamine::Data) -> CellValue {
    use calamine::Data;

    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::String(s) => {
            if s.trim().is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Error(_) => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}
