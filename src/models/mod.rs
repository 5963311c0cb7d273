//! Core data models: records and indexed tables.

mod table;

pub use table::*;
pub(crate) use table::nulls_as_float;

use polars::prelude::PolarsError;
use thiserror::Error;

/// One decoded API record: field name to JSON scalar, in arrival order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Errors raised by table operations.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Column {column} has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Dataframe error: {0}")]
    Polars(#[from] PolarsError),
}
