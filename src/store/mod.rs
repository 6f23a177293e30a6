//! The persistence contract this subsystem consumes.
//!
//! The host application decides which SQL engine backs a [`Store`]; this
//! crate only issues parameterized statements with positional `?`
//! placeholders and reads rows back as JSON objects keyed by column name.
//! Placeholder translation for dialects with numbered parameters is the
//! implementation's concern, not the caller's. A sea-orm-backed
//! implementation is provided in [`SeaOrmStore`].

mod sea_orm_store;

pub use sea_orm_store::SeaOrmStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Statement failed: {0}")]
    Execute(String),

    #[error("Row decode failed: {0}")]
    Decode(String),
}

/// Parameter bound to one positional `?` placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Null,
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(value as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row, keyed by column name.
#[derive(Clone, Debug)]
pub struct Row(serde_json::Map<String, Value>);

impl Row {
    pub fn from_object(columns: serde_json::Map<String, Value>) -> Self {
        Self(columns)
    }

    fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column).filter(|value| !value.is_null())
    }

    pub fn text(&self, column: &str) -> Result<String, StoreError> {
        self.opt_text(column)?
            .ok_or_else(|| StoreError::Decode(format!("column {} is null", column)))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, StoreError> {
        match self.get(column) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(StoreError::Decode(format!(
                "column {} is not text: {}",
                column, other
            ))),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, StoreError> {
        self.opt_integer(column)?
            .ok_or_else(|| StoreError::Decode(format!("column {} is null", column)))
    }

    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>, StoreError> {
        match self.get(column) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| {
                    StoreError::Decode(format!("column {} is not an integer: {}", column, value))
                }),
        }
    }
}

/// Parameterized read/write access to the relational store.
///
/// Implementations must be safe to call sequentially from one task; this
/// subsystem never issues concurrent statements against the same store.
#[async_trait]
pub trait Store: Send + Sync {
    async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>, StoreError>;

    async fn query_one(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Option<Row>, StoreError>;

    /// Runs a write statement, returning the affected row count.
    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<u64, StoreError>;
}
