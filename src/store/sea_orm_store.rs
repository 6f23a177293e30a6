use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, FromQueryResult, JsonValue, QueryResult,
    Statement,
};

use super::{Row, SqlValue, Store, StoreError};

/// [`Store`] implementation over a sea-orm connection.
///
/// Works against any backend sea-orm supports; statements are written with
/// `?` placeholders and rewritten to `$n` form for Postgres here.
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn statement(&self, sql: &str, params: Vec<SqlValue>) -> Statement {
        let backend = self.db.get_database_backend();
        let sql = match backend {
            DatabaseBackend::Postgres => number_placeholders(sql),
            _ => sql.to_string(),
        };
        let values = params.into_iter().map(db_value);
        Statement::from_sql_and_values(backend, &sql, values)
    }
}

fn db_value(value: SqlValue) -> sea_orm::Value {
    match value {
        SqlValue::Text(s) => s.into(),
        SqlValue::Integer(i) => i.into(),
        SqlValue::Real(f) => f.into(),
        SqlValue::Bool(b) => b.into(),
        SqlValue::Null => sea_orm::Value::String(None),
    }
}

/// Rewrites positional `?` placeholders as `$1..$n`. The subsystem never
/// embeds a literal question mark in its SQL, so a plain scan suffices.
fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut next = 0u32;
    for ch in sql.chars() {
        if ch == '?' {
            next += 1;
            out.push('$');
            out.push_str(&next.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

fn decode_row(result: &QueryResult) -> Result<Row, StoreError> {
    let value =
        JsonValue::from_query_result(result, "").map_err(|e| StoreError::Decode(e.to_string()))?;
    match value {
        JsonValue::Object(map) => Ok(Row::from_object(map)),
        other => Err(StoreError::Decode(format!(
            "expected object row, got {}",
            other
        ))),
    }
}

#[async_trait]
impl Store for SeaOrmStore {
    async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>, StoreError> {
        let results = self
            .db
            .query_all(self.statement(sql, params))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        results.iter().map(decode_row).collect()
    }

    async fn query_one(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Option<Row>, StoreError> {
        let result = self
            .db
            .query_one(self.statement(sql, params))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        result.as_ref().map(decode_row).transpose()
    }

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<u64, StoreError> {
        let result = self
            .db
            .execute(self.statement(sql, params))
            .await
            .map_err(|e| StoreError::Execute(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
