//! Query execution boundary
//!
//! All SQL built by this crate flows through [`QueryExecutor`], so the data
//! layer can run against Postgres in production and an in-memory double in
//! tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPool;

use crate::Result;

/// Bind values for parameterized queries.
///
/// Every dynamic value reaches SQL through one of these; query text never
/// contains client-supplied strings.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    IntArray(Vec<i64>),
    TextArray(Vec<String>),
}

pub(crate) fn push_int(bind_params: &mut Vec<BindValue>, value: i64) -> usize {
    bind_params.push(BindValue::Int(value));
    bind_params.len()
}

pub(crate) fn push_float(bind_params: &mut Vec<BindValue>, value: f64) -> usize {
    bind_params.push(BindValue::Float(value));
    bind_params.len()
}

pub(crate) fn push_text(bind_params: &mut Vec<BindValue>, value: String) -> usize {
    bind_params.push(BindValue::Text(value));
    bind_params.len()
}

pub(crate) fn push_date(bind_params: &mut Vec<BindValue>, value: NaiveDate) -> usize {
    bind_params.push(BindValue::Date(value));
    bind_params.len()
}

pub(crate) fn push_text_array(bind_params: &mut Vec<BindValue>, value: Vec<String>) -> usize {
    bind_params.push(BindValue::TextArray(value));
    bind_params.len()
}

/// Asynchronous SQL executor.
///
/// Row-returning queries must select a single JSONB column per row (the
/// builders in this crate emit `jsonb_build_object(...)` select lists);
/// scalar queries must select a single BIGINT column.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a row-returning query, decoding each row's first column as JSON.
    async fn query_rows(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<JsonValue>>;

    /// Run a query returning a single BIGINT value (e.g. `COUNT(*)`).
    async fn query_scalar(&self, sql: &str, binds: &[BindValue]) -> Result<i64>;

    /// Run a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, binds: &[BindValue]) -> Result<u64>;
}

/// Postgres-backed executor over a shared connection pool.
///
/// The pool is process-wide; pool exhaustion is the back-pressure mechanism
/// for concurrent requests.
#[derive(Debug, Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    binds: &'q [BindValue],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Float(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v),
            BindValue::Date(v) => query.bind(*v),
            BindValue::IntArray(vs) => query.bind(vs),
            BindValue::TextArray(vs) => query.bind(vs),
        };
    }
    query
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn query_rows(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<JsonValue>> {
        let rows = bind_all(sqlx::query(sql), binds)
            .fetch_all(&self.pool)
            .await
            .map_err(crate::Error::Database)?;

        use sqlx::Row;
        let decoded = rows
            .iter()
            .filter_map(|row| row.try_get::<JsonValue, _>(0).ok())
            .collect();

        Ok(decoded)
    }

    async fn query_scalar(&self, sql: &str, binds: &[BindValue]) -> Result<i64> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        for value in binds {
            query = match value {
                BindValue::Int(v) => query.bind(*v),
                BindValue::Float(v) => query.bind(*v),
                BindValue::Text(v) => query.bind(v),
                BindValue::Date(v) => query.bind(*v),
                BindValue::IntArray(vs) => query.bind(vs),
                BindValue::TextArray(vs) => query.bind(vs),
            };
        }

        query
            .fetch_one(&self.pool)
            .await
            .map_err(crate::Error::Database)
    }

    async fn execute(&self, sql: &str, binds: &[BindValue]) -> Result<u64> {
        let result = bind_all(sqlx::query(sql), binds)
            .execute(&self.pool)
            .await
            .map_err(crate::Error::Database)?;

        Ok(result.rows_affected())
    }
}
