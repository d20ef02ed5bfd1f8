//! Tabular interchange arrays.
//!
//! Every table loads from and saves to the same shape: row 0 is the literal
//! header (a list of column-name strings), the following rows carry one JSON
//! value per column. The save format is the load contract.

use serde_json::Value;

use crate::error::SchemaError;

/// Header row followed by data rows.
pub type TabularArray = Vec<Vec<Value>>;

/// Build a header row from column names.
pub fn header_row(columns: &[&str]) -> Vec<Value> {
    columns.iter().map(|c| Value::from(*c)).collect()
}

/// Split an array into its header and data rows.
///
/// Fails when the array is empty or the header is not a list of strings.
pub fn split_header(table: &TabularArray) -> Result<(Vec<&str>, &[Vec<Value>]), SchemaError> {
    let (header, rows) = table
        .split_first()
        .ok_or_else(|| SchemaError::new(0, "*", "missing header row"))?;
    let names = header
        .iter()
        .enumerate()
        .map(|(col, cell)| {
            cell.as_str()
                .ok_or_else(|| SchemaError::new(0, col.to_string(), "header cell is not a string"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((names, rows))
}

/// Require the header to equal `expected` exactly.
pub fn expect_header<'a>(
    table: &'a TabularArray,
    expected: &[&str],
) -> Result<&'a [Vec<Value>], SchemaError> {
    let (names, rows) = split_header(table)?;
    if names != expected {
        return Err(SchemaError::new(
            0,
            "*",
            format!("header {names:?} does not match {expected:?}"),
        ));
    }
    Ok(rows)
}

/// Typed, position-checked access to one data row.
///
/// `row` is the row's index within the whole array (header = 0), so errors
/// point at the line a user sees in an exported file.
pub struct RowReader<'a> {
    row: usize,
    header: &'a [&'a str],
    cells: &'a [Value],
}

impl<'a> RowReader<'a> {
    /// Wrap data row `data_index` (0-based, header excluded).
    pub fn new(data_index: usize, header: &'a [&'a str], cells: &'a [Value]) -> Result<Self, SchemaError> {
        let row = data_index + 1;
        if cells.len() != header.len() {
            return Err(SchemaError::new(
                row,
                "*",
                format!("expected {} cells, found {}", header.len(), cells.len()),
            ));
        }
        Ok(Self { row, header, cells })
    }

    fn error(&self, col: usize, reason: impl Into<String>) -> SchemaError {
        SchemaError::new(self.row, self.header[col], reason)
    }

    /// Integer cell that must equal the row's data index.
    pub fn index(&self, col: usize) -> Result<usize, SchemaError> {
        let expected = self.row - 1;
        match self.cells[col].as_u64() {
            Some(v) if v as usize == expected => Ok(expected),
            Some(v) => Err(self.error(col, format!("expected {expected}, found {v}"))),
            None => Err(self.error(col, "expected an integer")),
        }
    }

    /// String cell.
    pub fn string(&self, col: usize) -> Result<String, SchemaError> {
        self.cells[col]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(col, "expected a string"))
    }

    /// Boolean cell.
    pub fn boolean(&self, col: usize) -> Result<bool, SchemaError> {
        self.cells[col]
            .as_bool()
            .ok_or_else(|| self.error(col, "expected a bool"))
    }

    /// Finite numeric cell. Integers are accepted.
    pub fn float(&self, col: usize) -> Result<f64, SchemaError> {
        match self.cells[col].as_f64() {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(self.error(col, "expected a finite number")),
        }
    }

    /// Numeric cell that may be empty (`null` or `""`).
    pub fn optional_float(&self, col: usize) -> Result<Option<f64>, SchemaError> {
        if is_empty(&self.cells[col]) {
            return Ok(None);
        }
        self.float(col).map(Some)
    }

    /// Optional action reference: empty, a string, or a small non-negative
    /// integer (stored as its decimal text).
    pub fn optional_action(&self, col: usize) -> Result<Option<String>, SchemaError> {
        let cell = &self.cells[col];
        if is_empty(cell) {
            return Ok(None);
        }
        if let Some(s) = cell.as_str() {
            return Ok(Some(s.to_string()));
        }
        match cell.as_u64() {
            Some(v) if v <= u64::from(u16::MAX) => Ok(Some(v.to_string())),
            _ => Err(self.error(col, "expected empty, a string or a small integer")),
        }
    }

    /// Build an error for a semantic violation in `col`.
    pub fn reject(&self, col: usize, reason: impl Into<String>) -> SchemaError {
        self.error(col, reason)
    }
}

fn is_empty(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Parse a table attribute string into a tabular array.
pub fn parse_table_text(text: &str) -> Result<TabularArray, SchemaError> {
    serde_json::from_str(text).map_err(|e| SchemaError::new(0, "*", format!("not a tabular array: {e}")))
}

/// Render a tabular array as compact JSON text (table attribute form).
pub fn table_text(table: &TabularArray) -> String {
    Value::Array(table.iter().cloned().map(Value::Array).collect()).to_string()
}
