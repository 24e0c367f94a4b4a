//! Result-set marshaling.
//!
//! Turns a stream of dynamically shaped rows into ordered `(column, value)`
//! lists ready for JSON encoding. Either every row is returned or the first
//! error is; partial results never escape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use futures_util::{Stream, TryStreamExt};
use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, ValueRef};
use thiserror::Error;

/// Why a result set could not be marshaled.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// The statement failed or its columns could not be described.
    #[error("failed to query database: {0}")]
    Query(String),

    /// A single row could not be decoded.
    #[error("failed to scan row: {0}")]
    Scan(String),

    /// The cursor broke off after yielding rows.
    #[error("error iterating rows: {0}")]
    Cursor(String),
}

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Binary payloads are exposed as text.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Value::Text(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Wall-clock timestamps without a zone are read as UTC.
    pub fn from_naive(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts.and_utc())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Value::Timestamp(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }
}

/// One row, columns kept in result-set order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductRow(Vec<(String, Value)>);

impl ProductRow {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self(columns)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

}

impl Serialize for ProductRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A row whose shape is only known at runtime.
pub trait DecodeRow {
    /// Column names in result-set order.
    fn column_names(&self) -> Result<Vec<String>, MarshalError>;

    /// Decode the value at `index`, applying the coercion rules.
    fn decode_column(&self, index: usize) -> Result<Value, MarshalError>;
}

/// Drain `rows` into marshaled rows.
///
/// Columns are described from the first row and reused for the rest. An
/// error before the first row is a query failure, after it a cursor failure.
pub async fn marshal_rows<S, R>(rows: S) -> Result<Vec<ProductRow>, MarshalError>
where
    S: Stream<Item = Result<R, sqlx::Error>>,
    R: DecodeRow,
{
    let mut rows = std::pin::pin!(rows);
    let mut columns: Option<Vec<String>> = None;
    let mut out = Vec::new();

    loop {
        let row = match rows.try_next().await {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) if columns.is_none() => return Err(MarshalError::Query(e.to_string())),
            Err(e) => return Err(MarshalError::Cursor(e.to_string())),
        };

        if columns.is_none() {
            columns = Some(row.column_names()?);
        }
        let names = columns.as_deref().unwrap_or_default();

        let mut values = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            values.push((name.clone(), row.decode_column(index)?));
        }
        out.push(ProductRow::new(values));
    }

    Ok(out)
}

/// Built-in Postgres type OIDs with a dedicated coercion.
mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const JSON: u32 = 114;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const UUID: u32 = 2950;
    pub const JSONB: u32 = 3802;
}

/// Rows are expected in the text format of the simple query protocol, so
/// types without a dedicated coercion (numeric, enums, inet, intervals and
/// arrays among them) pass through as Postgres prints them.
impl DecodeRow for PgRow {
    fn column_names(&self) -> Result<Vec<String>, MarshalError> {
        Ok(self.columns().iter().map(|c| c.name().to_string()).collect())
    }

    fn decode_column(&self, index: usize) -> Result<Value, MarshalError> {
        let column = self
            .columns()
            .get(index)
            .ok_or_else(|| MarshalError::Query(format!("no column at index {}", index)))?;
        // Match on the OID: user-defined types have no resolved name here.
        let type_oid = column.type_info().oid().map(|o| o.0);

        let value = match type_oid {
            Some(oid::BOOL) => get::<bool>(self, index)?.map(Value::Bool),
            Some(oid::INT2) => get::<i16>(self, index)?.map(|v| Value::Integer(v.into())),
            Some(oid::INT4) => get::<i32>(self, index)?.map(|v| Value::Integer(v.into())),
            Some(oid::INT8) => get::<i64>(self, index)?.map(Value::Integer),
            Some(oid::FLOAT4) => get::<f32>(self, index)?.map(|v| Value::Float(v.into())),
            Some(oid::FLOAT8) => get::<f64>(self, index)?.map(Value::Float),
            Some(oid::TEXT | oid::VARCHAR | oid::BPCHAR | oid::NAME) => {
                get::<String>(self, index)?.map(Value::Text)
            }
            Some(oid::BYTEA) => get::<Vec<u8>>(self, index)?.map(|b| Value::from_bytes(&b)),
            Some(oid::UUID) => get::<uuid::Uuid>(self, index)?.map(|u| Value::Text(u.to_string())),
            Some(oid::JSON | oid::JSONB) => {
                get::<serde_json::Value>(self, index)?.map(|j| Value::Text(j.to_string()))
            }
            Some(oid::TIMESTAMPTZ) => get::<DateTime<Utc>>(self, index)?.map(Value::Timestamp),
            Some(oid::TIMESTAMP) => get::<NaiveDateTime>(self, index)?.map(Value::from_naive),
            Some(oid::DATE) => get::<NaiveDate>(self, index)?.map(Value::from_date),
            _ => raw(self, index)?,
        };

        Ok(value.unwrap_or(Value::Null))
    }
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>, MarshalError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| MarshalError::Scan(e.to_string()))
}

/// The column's wire bytes as text.
fn raw(row: &PgRow, index: usize) -> Result<Option<Value>, MarshalError> {
    let value = row
        .try_get_raw(index)
        .map_err(|e| MarshalError::Scan(e.to_string()))?;
    if value.is_null() {
        return Ok(None);
    }
    let bytes = value
        .as_bytes()
        .map_err(|e| MarshalError::Scan(e.to_string()))?;
    Ok(Some(Value::from_bytes(bytes)))
}
