//! SQLite driver.

use std::time::Duration;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{OpenFlags, ToSql};

use crate::error::{DbError, Error, Result};
use crate::handler::RowHandler;
use crate::opts::{Driver, Opts};
use crate::result::Column;
use crate::statement::QueryRequest;
use crate::value::{NumericalPrecisionPolicy, Value};

use super::Connection;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// A SQLite connection owned by one worker thread.
pub struct SqliteConn {
    conn: rusqlite::Connection,
    precision: NumericalPrecisionPolicy,
}

impl SqliteConn {
    /// Open the database named by `opts.database`.
    ///
    /// An empty name or `:memory:` opens a private in-memory database.
    /// Recognized params: `busy_timeout` (milliseconds), `mode=ro`.
    pub fn open(opts: &Opts) -> Result<Self> {
        let read_only = opts.param("mode") == Some("ro");
        let conn = if opts.database.is_empty() || opts.database == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else if read_only {
            rusqlite::Connection::open_with_flags(&opts.database, OpenFlags::SQLITE_OPEN_READ_ONLY)
        } else {
            rusqlite::Connection::open(&opts.database)
        }
        .map_err(|e| Error::Connection(format!("{}: {}", opts.database, e)))?;

        let busy_timeout = match opts.param("busy_timeout") {
            Some(ms) => ms.parse().map_err(|_| {
                Error::InvalidUsage(format!("Invalid busy_timeout: {}", ms))
            })?,
            None => DEFAULT_BUSY_TIMEOUT_MS,
        };
        conn.busy_timeout(Duration::from_millis(busy_timeout))
            .map_err(|e| Error::Connection(e.to_string()))?;
        if read_only {
            conn.pragma_update(None, "query_only", 1)
                .map_err(|e| Error::Connection(e.to_string()))?;
        }

        Ok(Self {
            conn,
            precision: opts.precision,
        })
    }

    fn cell(&self, value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Int(v),
            ValueRef::Real(v) => self.precision.apply_float(v),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        }
    }
}

impl Connection for SqliteConn {
    fn run(&mut self, request: &QueryRequest, handler: &mut dyn RowHandler) -> Result<()> {
        let mut stmt = self.conn.prepare(request.sql())?;

        if request.is_prepared() {
            for (name, value) in request.params() {
                let idx = stmt.parameter_index(name)?.ok_or_else(|| {
                    Error::Database(DbError::statement(format!("no such parameter: {}", name)))
                })?;
                stmt.raw_bind_parameter(idx, value)?;
            }
        }

        let columns: Vec<Column> = stmt
            .column_names()
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| Column::new(name, ordinal))
            .collect();
        handler.result_start(&columns)?;

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                cells.push(self.cell(row.get_ref(i)?));
            }
            handler.row(cells)?;
        }
        Ok(())
    }

    fn driver(&self) -> Driver {
        Driver::Sqlite
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(v) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*v))),
            Value::Int(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::CollectHandler;

    fn run(conn: &mut SqliteConn, request: QueryRequest) -> Result<crate::QueryResult> {
        let mut handler = CollectHandler::new();
        conn.run(&request, &mut handler)?;
        Ok(handler.into_result())
    }

    #[test]
    fn test_select_literal() {
        let mut conn = SqliteConn::open(&Opts::sqlite(":memory:")).unwrap();
        let res = run(&mut conn, QueryRequest::raw("SELECT 1 AS one, NULL AS nothing")).unwrap();
        assert_eq!(res.columns()[0].name, "one");
        assert_eq!(res.value(0, 0), Some(&Value::Int(1)));
        assert_eq!(res.value(0, 1), Some(&Value::Null));
    }

    #[test]
    fn test_named_binding() {
        let mut conn = SqliteConn::open(&Opts::sqlite(":memory:")).unwrap();
        let req = QueryRequest::prepared("SELECT :a + :b AS total, :c IS NULL AS c_null")
            .bind("a", 40)
            .bind("b", 2)
            .bind("c", None::<i32>);
        let res = run(&mut conn, req).unwrap();
        assert_eq!(res.value(0, 0), Some(&Value::Int(42)));
        assert_eq!(res.value(0, 1), Some(&Value::Int(1)));
    }

    #[test]
    fn test_unknown_parameter_is_statement_error() {
        let mut conn = SqliteConn::open(&Opts::sqlite(":memory:")).unwrap();
        let req = QueryRequest::prepared("SELECT :a").bind("zzz", 1);
        let err = run(&mut conn, req).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn test_precision_applies_to_real() {
        let opts = Opts {
            precision: NumericalPrecisionPolicy::LowPrecisionInt32,
            ..Opts::sqlite(":memory:")
        };
        let mut conn = SqliteConn::open(&opts).unwrap();
        let res = run(&mut conn, QueryRequest::raw("SELECT 7.9, 3")).unwrap();
        assert_eq!(res.value(0, 0), Some(&Value::Int(7)));
        assert_eq!(res.value(0, 1), Some(&Value::Int(3)));
    }

    #[test]
    fn test_bad_busy_timeout() {
        let mut opts = Opts::sqlite(":memory:");
        opts.params.push(("busy_timeout".into(), "soon".into()));
        assert!(matches!(SqliteConn::open(&opts), Err(Error::InvalidUsage(_))));
    }
}
