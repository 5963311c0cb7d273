//! Indexed table over a polars [`DataFrame`].
//!
//! Tables built from API records or computed joins have a positional index
//! (`0..n`, not stored). Tables loaded with an index column, or re-indexed
//! through [`Table::set_index`], keep that column first in the frame.

use std::io::Cursor;

use polars::prelude::*;

use super::{Record, TableError};

/// Scratch column holding left row positions during a join.
const JOIN_ORDER: &str = "__join_order";

/// A dataframe plus an optional index column.
#[derive(Debug, Clone, Default)]
pub struct Table {
    frame: DataFrame,
    index: Option<PlSmallStr>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.frame.equals_missing(&other.frame)
    }
}

impl Table {
    /// Wrap a dataframe with a positional index.
    pub fn new(frame: DataFrame) -> Self {
        Self { frame, index: None }
    }

    /// Wrap a dataframe whose column `index` holds the row labels.
    pub fn with_index(frame: DataFrame, index: &str) -> Result<Self, TableError> {
        let mut table = Self::new(frame);
        table.set_index(index)?;
        Ok(table)
    }

    /// Build a table from decoded JSON records.
    ///
    /// Columns are the union of record keys in first-seen order; a record
    /// missing a key contributes a null. A key that is null in every record
    /// reads as a float column.
    pub fn from_records(records: &[Record]) -> Result<Self, TableError> {
        if records.is_empty() {
            return Ok(Self::default());
        }
        let body = serde_json::to_vec(records)
            .map_err(|e| PolarsError::ComputeError(e.to_string().into()))?;
        let frame = JsonReader::new(Cursor::new(body))
            .infer_schema_len(None)
            .finish()?;
        Ok(Self::new(nulls_as_float(frame)?))
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of data columns.
    pub fn width(&self) -> usize {
        self.columns().count()
    }

    /// The whole frame, index column first when there is one.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn index_column(&self) -> Option<&Column> {
        self.index
            .as_ref()
            .and_then(|name| self.frame.column(name).ok())
    }

    fn is_index(&self, name: &str) -> bool {
        self.index.as_deref() == Some(name)
    }

    /// Data columns in frame order, without the index.
    pub fn columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.frame
            .get_columns()
            .iter()
            .filter(move |c| !self.is_index(c.name().as_str()))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns().map(|c| c.name().as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        !self.is_index(name) && self.frame.get_column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        if !self.has_column(name) {
            return Err(TableError::ColumnNotFound(name.to_string()));
        }
        Ok(self.frame.column(name)?)
    }

    /// Cell at `row` in data column `name`.
    pub fn value(&self, row: usize, name: &str) -> Option<AnyValue<'_>> {
        self.column(name).ok()?.get(row).ok()
    }

    /// Insert a column, replacing a data column of the same name in place.
    pub fn set_column(&mut self, column: Column) -> Result<(), TableError> {
        let actual = column.len();
        if self.frame.width() > 0 && actual != self.len() {
            return Err(TableError::LengthMismatch {
                column: column.name().to_string(),
                expected: self.len(),
                actual,
            });
        }
        self.frame.with_column(column)?;
        Ok(())
    }

    /// Remove data columns by name. Every name must exist.
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<(), TableError> {
        if let Some(missing) = names.iter().find(|n| !self.has_column(n)) {
            return Err(TableError::ColumnNotFound(missing.to_string()));
        }
        for name in names {
            self.frame.drop_in_place(name)?;
        }
        Ok(())
    }

    /// Rename data columns; names that are absent are ignored.
    pub fn rename_columns(&mut self, renames: &[(&str, &str)]) -> Result<(), TableError> {
        for (from, to) in renames {
            if self.has_column(from) {
                self.frame.rename(from, (*to).into())?;
            }
        }
        Ok(())
    }

    /// Apply `f` to every data column name.
    pub fn map_column_names(&mut self, f: impl Fn(&str) -> String) -> Result<(), TableError> {
        let renames: Vec<(String, String)> = self
            .column_names()
            .into_iter()
            .map(|name| (name.to_string(), f(name)))
            .filter(|(from, to)| from != to)
            .collect();
        for (from, to) in renames {
            self.frame.rename(&from, to.into())?;
        }
        Ok(())
    }

    /// Make data column `name` the index, discarding the current index.
    pub fn set_index(&mut self, name: &str) -> Result<(), TableError> {
        if !self.has_column(name) {
            return Err(TableError::ColumnNotFound(name.to_string()));
        }
        if let Some(old) = self.index.take() {
            self.frame.drop_in_place(&old)?;
        }
        let column = self.frame.drop_in_place(name)?;
        self.frame.insert_column(0, column)?;
        self.index = Some(name.into());
        Ok(())
    }

    /// Stable ascending sort of the rows by index value, nulls last.
    ///
    /// A positional index is already sorted.
    pub fn sort_by_index(&mut self) -> Result<(), TableError> {
        let Some(index) = &self.index else {
            return Ok(());
        };
        self.frame = self.frame.sort(
            [index.as_str()],
            SortMultipleOptions::default()
                .with_maintain_order(true)
                .with_nulls_last(true),
        )?;
        Ok(())
    }

    /// Strictly cast the named data columns. Every name must exist.
    pub fn cast_columns(&mut self, casts: &[(&str, DataType)]) -> Result<(), TableError> {
        for (name, dtype) in casts {
            let cast = self
                .column(name)?
                .as_materialized_series()
                .strict_cast(dtype)?;
            self.frame.with_column(cast)?;
        }
        Ok(())
    }

    /// Evaluate expressions over the frame, adding or replacing columns.
    pub fn with_columns(&mut self, exprs: Vec<Expr>) -> Result<(), TableError> {
        if exprs.is_empty() {
            return Ok(());
        }
        self.frame = self.frame.clone().lazy().with_columns(exprs).collect()?;
        Ok(())
    }

    /// Replace every null cell in every data column with zero.
    pub fn fill_nulls_with_zero(&mut self) -> Result<(), TableError> {
        let fills: Vec<Expr> = self
            .columns()
            .filter(|c| c.null_count() > 0)
            .map(|c| col(c.name().clone()).fill_null(lit(0)))
            .collect();
        self.with_columns(fills)
    }

    /// The data columns as a frame of their own.
    fn data(&self) -> Result<DataFrame, TableError> {
        let mut frame = self.frame.clone();
        if let Some(index) = &self.index {
            frame.drop_in_place(index)?;
        }
        Ok(frame)
    }

    /// Inner join on `self[left_on] == right[right_on]`.
    ///
    /// Output rows follow the left table's order. Left rows without a match
    /// are dropped, and null keys never match. Columns are the left columns
    /// then the right columns; names present on both sides get `_x` / `_y`
    /// suffixes. Integer and float keys are compared as floats. The result
    /// has a positional index.
    pub fn inner_join(
        &self,
        right: &Table,
        left_on: &str,
        right_on: &str,
    ) -> Result<Table, TableError> {
        let left_dtype = self.column(left_on)?.dtype().clone();
        let right_dtype = right.column(right_on)?.dtype().clone();

        let left_names = owned_names(self);
        let right_names = owned_names(right);
        let left_out = suffixed(&left_names, &right_names, "_x");
        let right_out = suffixed(&right_names, &left_names, "_y");

        let mut left_frame = self.data()?;
        rename_all(&mut left_frame, &left_names, &left_out)?;
        let mut right_frame = right.data()?;
        rename_all(&mut right_frame, &right_names, &right_out)?;

        let left_key = key_name(&left_names, &left_out, left_on);
        let right_key = key_name(&right_names, &right_out, right_on);

        let (mut left_expr, mut right_expr) = (col(left_key), col(right_key));
        if left_dtype != right_dtype && is_number(&left_dtype) && is_number(&right_dtype) {
            left_expr = left_expr.cast(DataType::Float64);
            right_expr = right_expr.cast(DataType::Float64);
        }

        // The right key equals the left key on every joined row.
        let mut select: Vec<Expr> = left_out.iter().map(|n| col(n.as_str())).collect();
        select.extend(right_out.iter().map(|n| {
            if n == right_key {
                col(left_key).alias(n.as_str())
            } else {
                col(n.as_str())
            }
        }));

        let frame = left_frame
            .lazy()
            .with_row_index(JOIN_ORDER, None)
            .join(
                right_frame.lazy(),
                [left_expr],
                [right_expr],
                JoinArgs::new(JoinType::Inner),
            )
            .sort(
                [JOIN_ORDER],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .select(select)
            .collect()?;

        Ok(Table::new(frame))
    }
}

/// Cast every column that is null throughout to `Float64`.
///
/// Readers infer such columns as string or null-typed.
pub(crate) fn nulls_as_float(mut frame: DataFrame) -> Result<DataFrame, TableError> {
    if frame.height() == 0 {
        return Ok(frame);
    }
    let empty: Vec<PlSmallStr> = frame
        .get_columns()
        .iter()
        .filter(|c| c.null_count() == c.len() && !c.dtype().is_float())
        .map(|c| c.name().clone())
        .collect();
    for name in empty {
        let cast = frame.column(&name)?.cast(&DataType::Float64)?;
        frame.with_column(cast)?;
    }
    Ok(frame)
}

fn is_number(dtype: &DataType) -> bool {
    dtype.is_integer() || dtype.is_float()
}

fn owned_names(table: &Table) -> Vec<String> {
    table.column_names().into_iter().map(str::to_string).collect()
}

fn suffixed(names: &[String], other: &[String], suffix: &str) -> Vec<String> {
    names
        .iter()
        .map(|n| {
            if other.contains(n) {
                format!("{n}{suffix}")
            } else {
                n.clone()
            }
        })
        .collect()
}

fn rename_all(frame: &mut DataFrame, from: &[String], to: &[String]) -> Result<(), TableError> {
    for (old, new) in from.iter().zip(to) {
        if old != new {
            frame.rename(old, new.as_str().into())?;
        }
    }
    Ok(())
}

fn key_name<'a>(names: &[String], renamed: &'a [String], key: &'a str) -> &'a str {
    names
        .iter()
        .position(|n| n == key)
        .map(|pos| renamed[pos].as_str())
        .unwrap_or(key)
}
