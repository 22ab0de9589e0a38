//! Minimal storage contract: run SQL with positional parameters and get rows
//! back as portable JSON objects.
//!
//! Everything above this module (seeding, ingest, the guarded query layer)
//! talks to a `&dyn Store`, so tests can swap in an in-memory double and the
//! binary can pass one explicitly constructed [`PgStore`] handle around.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::StoreError;

mod pg;

pub use pg::PgStore;

// ---

/// One result row. Keys keep the column order of the statement.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A positional parameter (`$1`, `$2`, ...). `None` binds a typed NULL so
/// Postgres can still infer the column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    /// UTC wall-clock time, stored in `TIMESTAMP` columns.
    Timestamp(Option<NaiveDateTime>),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Execute one statement and return every row it produced.
    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, StoreError>;

    /// Execute one statement that must not write. Backends that support it
    /// run the statement inside a read-only transaction.
    async fn query_read_only(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<Row>, StoreError> {
        self.query(sql, params).await
    }

    /// Release the underlying connections.
    async fn close(&self);
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(Some(v.to_string()))
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(Some(v))
    }
}

impl From<Option<&str>> for SqlParam {
    fn from(v: Option<&str>) -> Self {
        SqlParam::Text(v.map(str::to_string))
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(Some(i64::from(v)))
    }
}

impl From<Option<i32>> for SqlParam {
    fn from(v: Option<i32>) -> Self {
        SqlParam::Int(v.map(i64::from))
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(Some(v))
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(Some(v))
    }
}

impl From<Option<f64>> for SqlParam {
    fn from(v: Option<f64>) -> Self {
        SqlParam::Float(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(Some(v))
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(Some(v.naive_utc()))
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory [`Store`] double that records every statement it receives.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingStore {
        calls: Mutex<Vec<(String, Vec<SqlParam>)>>,
        responses: Mutex<VecDeque<Result<Vec<Row>, StoreError>>>,
        read_only: Mutex<Vec<String>>,
        pub closed: Mutex<bool>,
    }

    impl RecordingStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the result for the next call. Calls beyond the queue get
        /// an empty row set.
        pub fn respond(&self, result: Result<Vec<Row>, StoreError>) {
            self.responses.lock().unwrap().push_back(result);
        }

        pub fn respond_rows(&self, rows: Vec<serde_json::Value>) {
            let rows = rows
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::Object(map) => map,
                    other => panic!("row must be a JSON object, got {other}"),
                })
                .collect();
            self.respond(Ok(rows));
        }

        pub fn calls(&self) -> Vec<(String, Vec<SqlParam>)> {
            self.calls.lock().unwrap().clone()
        }

        /// Statements that went through [`Store::query_read_only`].
        pub fn read_only_calls(&self) -> Vec<String> {
            self.read_only.lock().unwrap().clone()
        }

        pub fn last_sql(&self) -> String {
            self.calls().last().map(|(sql, _)| sql.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Store for RecordingStore {
        async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, StoreError> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn query_read_only(
            &self,
            sql: &str,
            params: &[SqlParam],
        ) -> Result<Vec<Row>, StoreError> {
            self.read_only.lock().unwrap().push(sql.to_string());
            self.query(sql, params).await
        }

        async fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_bind_as_naive_utc() {
        // ---
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
        let SqlParam::Timestamp(Some(naive)) = SqlParam::from(at) else {
            panic!("expected a timestamp parameter");
        };
        assert_eq!(naive.to_string(), "2025-01-01 12:30:00");
    }

    #[test]
    fn test_optional_values_bind_typed_nulls() {
        // ---
        assert_eq!(SqlParam::from(None::<f64>), SqlParam::Float(None));
        assert_eq!(SqlParam::from(None::<i32>), SqlParam::Int(None));
        assert_eq!(SqlParam::from(Some(7_i32)), SqlParam::Int(Some(7)));
    }
}
