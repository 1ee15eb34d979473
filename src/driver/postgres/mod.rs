//! PostgreSQL driver.

mod numeric;

use std::error::Error as StdError;

use bytes::BytesMut;
use postgres::types::{FromSql, IsNull, ToSql, Type};
use postgres::{Client, NoTls, Row};

use crate::error::{DbError, Error, Result};
use crate::handler::RowHandler;
use crate::opts::{Driver, Opts};
use crate::result::Column;
use crate::statement::{QueryRequest, rewrite_named_placeholders};
use crate::value::{NumericalPrecisionPolicy, Value};

use super::Connection;

pub use numeric::numeric_to_string;

type BoxError = Box<dyn StdError + Sync + Send>;

/// A PostgreSQL connection owned by one worker thread.
pub struct PgConn {
    client: Client,
    precision: NumericalPrecisionPolicy,
}

impl PgConn {
    /// Connect using the options plus every pass-through param.
    pub fn open(opts: &Opts) -> Result<Self> {
        let config: postgres::Config = connection_string(opts)
            .parse()
            .map_err(|e: postgres::Error| Error::InvalidUsage(e.to_string()))?;
        let client = config
            .connect(NoTls)
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self {
            client,
            precision: opts.precision,
        })
    }

    fn cell(&self, row: &Row, idx: usize, ty: &Type) -> Result<Value> {
        let value = match *ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
            Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
            Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
            Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
            Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)?
                .map(|v| self.precision.apply_float(f64::from(v))),
            Type::FLOAT8 => row
                .try_get::<_, Option<f64>>(idx)?
                .map(|v| self.precision.apply_float(v)),
            Type::NUMERIC => match row.try_get::<_, Option<Numeric>>(idx)? {
                Some(Numeric(text)) => Some(self.precision.apply_decimal(text)?),
                None => None,
            },
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
            }
            _ => row
                .try_get::<_, Option<RawCell>>(idx)?
                .map(|RawCell(bytes)| Value::Bytes(bytes)),
        };
        Ok(value.unwrap_or(Value::Null))
    }
}

impl Connection for PgConn {
    fn run(&mut self, request: &QueryRequest, handler: &mut dyn RowHandler) -> Result<()> {
        let (sql, names) = if request.is_prepared() {
            rewrite_named_placeholders(request.sql())
        } else {
            (request.sql().to_string(), Vec::new())
        };

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(names.len());
        for name in &names {
            let value = request.params().get(name).ok_or_else(|| {
                Error::Database(DbError::statement(format!("no value bound for {}", name)))
            })?;
            params.push(value);
        }
        if let Some(extra) = request.params().keys().find(|k| !names.contains(k)) {
            return Err(Error::Database(DbError::statement(format!(
                "no such parameter: {}",
                extra
            ))));
        }

        let stmt = self.client.prepare(&sql)?;
        let columns: Vec<Column> = stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, col)| Column::new(col.name(), ordinal).with_type(col.type_().name()))
            .collect();
        handler.result_start(&columns)?;

        let rows = self.client.query(&stmt, &params)?;
        for row in &rows {
            let mut cells = Vec::with_capacity(columns.len());
            for (idx, col) in stmt.columns().iter().enumerate() {
                cells.push(self.cell(row, idx, col.type_())?);
            }
            handler.row(cells)?;
        }
        Ok(())
    }

    fn driver(&self) -> Driver {
        Driver::Postgres
    }
}

/// Build a `key=value` connection string from the options.
fn connection_string(opts: &Opts) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if !opts.host.is_empty() {
        pairs.push(("host", opts.host.clone()));
    }
    if let Some(port) = opts.port {
        pairs.push(("port", port.to_string()));
    }
    if !opts.user.is_empty() {
        pairs.push(("user", opts.user.clone()));
    }
    if let Some(password) = &opts.password {
        pairs.push(("password", password.clone()));
    }
    if !opts.database.is_empty() {
        pairs.push(("dbname", opts.database.clone()));
    }
    for (key, value) in &opts.params {
        pairs.push((key.as_str(), value.clone()));
    }

    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, quote(&value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// NUMERIC cell kept in its exact decimal form.
struct Numeric(String);

impl<'a> FromSql<'a> for Numeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(Numeric(numeric_to_string(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Cell of a type without a dedicated mapping, kept as its binary encoding.
struct RawCell(Vec<u8>);

impl<'a> FromSql<'a> for RawCell {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(RawCell(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => v.to_string().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => v.to_string().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Text(v) => v.as_str().to_sql(ty, out),
            Value::Bytes(v) => v.as_slice().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    postgres::types::to_sql_checked!();
}
