//! Postgres-backed [`Store`] built on an `sqlx` connection pool.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo, ValueRef};

use super::{Row, SqlParam, Store};
use crate::error::StoreError;

// ---

/// Shared handle over a Postgres pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool against `db_url`.
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        // ---
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, StoreError> {
        // ---
        let query = params.iter().fold(sqlx::query(sql), bind_param);
        let rows = query.fetch_all(&self.pool).await?;
        tracing::trace!(rows = rows.len(), params = params.len(), "statement executed");

        rows.iter().map(decode_row).collect()
    }

    async fn query_read_only(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<Row>, StoreError> {
        // ---
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        let query = params.iter().fold(sqlx::query(sql), bind_param);
        let rows = query.fetch_all(&mut *tx).await?;
        tx.rollback().await?;
        tracing::trace!(rows = rows.len(), "read-only statement executed");

        rows.iter().map(decode_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &SqlParam,
) -> Query<'q, Postgres, PgArguments> {
    // ---
    match param.clone() {
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Float(v) => query.bind(v),
        SqlParam::Bool(v) => query.bind(v),
        SqlParam::Timestamp(v) => query.bind(v),
    }
}

/// Convert one Postgres row into a JSON object.
///
/// Every integer width becomes a JSON integer and every fractional type
/// (including `NUMERIC`) a JSON float, so callers never see driver-specific
/// numeric types. Timestamps are rendered as RFC 3339 UTC strings.
fn decode_row(row: &PgRow) -> Result<Row, StoreError> {
    // ---
    let mut out = Row::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name().to_string();

        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            out.insert(name, Value::Null);
            continue;
        }

        let value = match type_name.as_str() {
            "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
            "INT2" => Value::from(row.try_get::<i16, _>(idx)?),
            "INT4" => Value::from(row.try_get::<i32, _>(idx)?),
            "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
            "FLOAT4" => float_value(f64::from(row.try_get::<f32, _>(idx)?)),
            "FLOAT8" => float_value(row.try_get::<f64, _>(idx)?),
            "NUMERIC" => {
                let decimal = row.try_get::<Decimal, _>(idx)?;
                match decimal.to_f64() {
                    Some(v) => float_value(v),
                    None => {
                        return Err(StoreError::Decode {
                            column: name.clone(),
                            type_name: type_name.clone(),
                        })
                    }
                }
            }
            "TIMESTAMP" => {
                let naive = row.try_get::<NaiveDateTime, _>(idx)?;
                Value::String(naive.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            "TIMESTAMPTZ" => {
                let at = row.try_get::<DateTime<Utc>, _>(idx)?;
                Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::String(row.try_get::<String, _>(idx)?),
            _ => match row.try_get::<String, _>(idx) {
                Ok(text) => Value::String(text),
                Err(_) => {
                    tracing::debug!(column = %name, %type_name, "unsupported column type, returning null");
                    Value::Null
                }
            },
        };

        out.insert(name, value);
    }

    Ok(out)
}

/// JSON has no NaN or infinity; those become `null`.
fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}
