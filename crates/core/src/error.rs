use thiserror::Error;

use crate::matrix::{CellAddress, ColumnType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} result matrix")]
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("column {col} is outside the {cols} result columns")]
    ColumnOutOfRange { col: usize, cols: usize },
    #[error("row {row} is outside the {rows} result rows")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("cell {editing} is already being edited; cannot edit {requested}")]
    EditConflict {
        editing: CellAddress,
        requested: CellAddress,
    },
    #[error("no cell is being edited")]
    NotEditing,
    #[error("`{text}` is not a valid {expected} value for column `{column}`")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        text: String,
    },
    #[error("column {0} appears more than once in the column arrangement")]
    DuplicateColumn(usize),
    #[error("no result column is named `{0}`")]
    UnknownColumn(String),
}
