//! Row handlers used by drivers to hand results to the materializer.

use crate::error::Result;
use crate::result::{Column, QueryResult};
use crate::value::Value;

/// Receives one result set from a driver.
///
/// Callback pattern:
/// - statement with a result set: `result_start` → `row*`
/// - statement without one (INSERT, DDL, ...): `result_start` with no columns
pub trait RowHandler {
    /// Called once before any row, with the result schema.
    fn result_start(&mut self, cols: &[Column]) -> Result<()> {
        let _ = cols;
        Ok(())
    }

    /// Called for each row. `row` has one value per column.
    fn row(&mut self, row: Vec<Value>) -> Result<()>;
}

/// Buffers a whole result set in memory.
#[derive(Debug, Default)]
pub struct CollectHandler {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl CollectHandler {
    /// Create a new collect handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows collected so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finish and build the result.
    pub fn into_result(self) -> QueryResult {
        QueryResult::new(self.columns, self.rows)
    }
}

impl RowHandler for CollectHandler {
    fn result_start(&mut self, cols: &[Column]) -> Result<()> {
        self.columns = cols.to_vec();
        self.rows.clear();
        Ok(())
    }

    fn row(&mut self, row: Vec<Value>) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }
}
