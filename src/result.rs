//! Materialized query results.

use std::sync::Arc;

use crate::error::DbError;
use crate::value::Value;

/// Column descriptor from the result schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name as reported by the driver
    pub name: String,
    /// Zero-based position in the row
    pub ordinal: usize,
    /// Driver type name, if the driver reports one
    pub type_name: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            ordinal,
            type_name: None,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

#[derive(Debug, Default)]
struct ResultData {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    error: Option<DbError>,
}

/// Result of one executed request.
///
/// Built once by the worker that ran the request and never modified after.
/// Cloning shares the underlying storage, so handing copies to several
/// subscribers or threads is cheap.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    data: Arc<ResultData>,
}

impl QueryResult {
    /// A successful result. Every row must have one value per column.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        Self {
            data: Arc::new(ResultData {
                columns,
                rows,
                error: None,
            }),
        }
    }

    /// A failed result carrying only the error.
    pub fn from_error(error: DbError) -> Self {
        Self {
            data: Arc::new(ResultData {
                columns: Vec::new(),
                rows: Vec::new(),
                error: Some(error),
            }),
        }
    }

    /// Returns true if no error occurred.
    pub fn is_valid(&self) -> bool {
        self.data.error.is_none()
    }

    /// The error, if the query failed.
    pub fn error(&self) -> Option<&DbError> {
        self.data.error.as_ref()
    }

    /// Column descriptors (the head record).
    pub fn columns(&self) -> &[Column] {
        &self.data.columns
    }

    pub fn column_count(&self) -> usize {
        self.data.columns.len()
    }

    /// Position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.data.columns.iter().position(|c| c.name == name)
    }

    /// Number of rows.
    pub fn count(&self) -> usize {
        self.data.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.rows.is_empty()
    }

    /// Value at `row`, `col`.
    ///
    /// Returns `None` if either index is out of range; a SQL NULL is
    /// `Some(&Value::Null)`.
    pub fn value(&self, row: usize, col: usize) -> Option<&Value> {
        self.data.rows.get(row)?.get(col)
    }

    /// Value at `row` in the column called `name`.
    pub fn value_by_name(&self, row: usize, name: &str) -> Option<&Value> {
        self.value(row, self.column_index(name)?)
    }

    /// One row paired with the column descriptors.
    pub fn record(&self, row: usize) -> Option<Record<'_>> {
        let values = self.data.rows.get(row)?;
        Some(Record {
            columns: &self.data.columns,
            values,
        })
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.data.rows
    }
}

/// A borrowed row with access by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [Column],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn columns(&self) -> &'a [Column] {
        self.columns
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn get(&self, col: usize) -> Option<&'a Value> {
        self.values.get(col)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        self.values.get(idx)
    }

    pub fn field_name(&self, col: usize) -> Option<&'a str> {
        self.columns.get(col).map(|c| c.name.as_str())
    }
}
