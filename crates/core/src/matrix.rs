use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::GridError;

const DUPLICATE_RENAME_ATTEMPTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    #[default]
    Any,
    Text,
    Integer,
    Real,
    Binary,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Any => "any",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Binary => "binary",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Binary(Vec<u8>),
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text written to the clipboard for this value. Null copies as an empty string.
    #[must_use]
    pub fn to_clipboard_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(text) => text.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
            Self::Binary(bytes) => format!("[BLOB {} bytes]", bytes.len()),
        }
    }

    /// Parses `text` as a scalar for a column of `column_type`.
    ///
    /// Returns `None` when the text cannot represent a value of that type.
    #[must_use]
    pub fn coerce(text: &str, column_type: ColumnType) -> Option<Self> {
        let trimmed = text.trim();
        match column_type {
            ColumnType::Text => Some(Self::Text(text.to_string())),
            ColumnType::Integer => {
                if trimmed.is_empty() {
                    return Some(Self::Null);
                }
                trimmed.parse::<i64>().ok().map(Self::Integer)
            }
            ColumnType::Real => {
                if trimmed.is_empty() {
                    return Some(Self::Null);
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .map(Self::Real)
            }
            ColumnType::Binary => None,
            ColumnType::Any => {
                if let Ok(value) = trimmed.parse::<i64>() {
                    Some(Self::Integer(value))
                } else if let Some(value) = trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
                {
                    Some(Self::Real(value))
                } else {
                    Some(Self::Text(text.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDisplay {
    pub text: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub display: HeaderDisplay,
    pub column_type: ColumnType,
    index: usize,
}

impl Header {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub display_name: Option<String>,
    pub column_type: ColumnType,
    pub icon: Option<String>,
}

impl ColumnDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            column_type,
            icon: None,
        }
    }
}

/// A results payload as delivered by a driver: ordered columns and positional rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    /// Builds a result set, renaming repeated column names to `__{name}_{i}`.
    /// The original name stays as the display label.
    #[must_use]
    pub fn new(columns: Vec<ColumnDefinition>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut seen = HashSet::with_capacity(columns.len());
        let columns = columns
            .into_iter()
            .map(|mut column| {
                let unique = unique_column_name(&column.name, &seen);
                if unique != column.name {
                    column.display_name.get_or_insert_with(|| column.name.clone());
                    column.name = unique;
                }
                seen.insert(column.name.clone());
                column
            })
            .collect();
        Self { columns, rows }
    }
}

fn unique_column_name(name: &str, seen: &HashSet<String>) -> String {
    let mut candidate = name.to_string();
    for attempt in 0..DUPLICATE_RENAME_ATTEMPTS {
        if !seen.contains(&candidate) {
            return candidate;
        }
        candidate = format!("__{name}_{attempt}");
    }

    let mut attempt = DUPLICATE_RENAME_ATTEMPTS;
    while seen.contains(&candidate) {
        candidate = format!("__{name}_{attempt}");
        attempt += 1;
    }
    candidate
}

#[derive(Debug, Clone, Default)]
pub struct ResultMatrix {
    headers: Vec<Header>,
    rows: Vec<Vec<CellValue>>,
    original_values: BTreeMap<CellAddress, CellValue>,
}

impl ResultMatrix {
    #[must_use]
    pub fn from_result_set(result: ResultSet) -> Self {
        let result = ResultSet::new(result.columns, result.rows);
        let headers = result
            .columns
            .into_iter()
            .enumerate()
            .map(|(index, column)| Header {
                display: HeaderDisplay {
                    text: column.display_name.unwrap_or_else(|| column.name.clone()),
                    icon: column.icon,
                },
                name: column.name,
                column_type: column.column_type,
                index,
            })
            .collect::<Vec<_>>();

        let width = headers.len();
        let rows = result
            .rows
            .into_iter()
            .map(|row| fit_row(row, width))
            .collect();

        Self {
            headers,
            rows,
            original_values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, col: usize) -> Option<&Header> {
        self.headers.get(col)
    }

    #[must_use]
    pub fn header_by_name(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|header| header.name == name)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    pub fn validate(&self, row: usize, col: usize) -> Result<CellAddress, GridError> {
        if row >= self.row_count() || col >= self.header_count() {
            return Err(GridError::OutOfRange {
                row,
                col,
                rows: self.row_count(),
                cols: self.header_count(),
            });
        }
        Ok(CellAddress::new(row, col))
    }

    pub fn validate_col(&self, col: usize) -> Result<(), GridError> {
        if col >= self.header_count() {
            return Err(GridError::ColumnOutOfRange {
                col,
                cols: self.header_count(),
            });
        }
        Ok(())
    }

    pub fn validate_row(&self, row: usize) -> Result<(), GridError> {
        if row >= self.row_count() {
            return Err(GridError::RowOutOfRange {
                row,
                rows: self.row_count(),
            });
        }
        Ok(())
    }

    pub fn value(&self, row: usize, col: usize) -> Result<&CellValue, GridError> {
        let address = self.validate(row, col)?;
        Ok(&self.rows[address.row][address.col])
    }

    pub fn row_values(&self, row: usize) -> Result<&[CellValue], GridError> {
        self.validate_row(row)?;
        Ok(&self.rows[row])
    }

    /// Writes `value` into the cell. Returns `false` when the cell already held it.
    pub fn change_value(
        &mut self,
        row: usize,
        col: usize,
        value: CellValue,
    ) -> Result<bool, GridError> {
        let address = self.validate(row, col)?;
        let cell = &mut self.rows[address.row][address.col];
        if *cell == value {
            return Ok(false);
        }

        let previous = std::mem::replace(cell, value);
        match self.original_values.get(&address) {
            Some(original) if *original == self.rows[address.row][address.col] => {
                self.original_values.remove(&address);
            }
            Some(_) => {}
            None => {
                self.original_values.insert(address, previous);
            }
        }
        Ok(true)
    }

    /// Appends rows to the loaded page. Returns the index range of the new rows.
    pub fn append_rows(&mut self, rows: Vec<Vec<CellValue>>) -> std::ops::Range<usize> {
        let start = self.rows.len();
        let width = self.header_count();
        self.rows
            .extend(rows.into_iter().map(|row| fit_row(row, width)));
        start..self.rows.len()
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.original_values.is_empty()
    }

    pub fn changed_cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.original_values.keys().copied()
    }

    #[must_use]
    pub fn original_value(&self, address: CellAddress) -> Option<&CellValue> {
        self.original_values.get(&address)
    }

    /// Restores every changed cell to its loaded value.
    pub fn discard_changes(&mut self) -> Vec<CellAddress> {
        let originals = std::mem::take(&mut self.original_values);
        let mut restored = Vec::with_capacity(originals.len());
        for (address, value) in originals {
            self.rows[address.row][address.col] = value;
            restored.push(address);
        }
        restored
    }

    /// Treats the current values as the new baseline, e.g. after the host saved them.
    pub fn accept_changes(&mut self) -> Vec<CellAddress> {
        std::mem::take(&mut self.original_values)
            .into_keys()
            .collect()
    }
}

fn fit_row(mut row: Vec<CellValue>, width: usize) -> Vec<CellValue> {
    row.resize(width, CellValue::Null);
    row
}
