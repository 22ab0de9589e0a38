//! Guarded, read-only access to the readings store.
//!
//! This is the whole surface the tool-calling loop gets: fixed-shape range
//! and aggregate queries with every value parameter-bound, plus a gated
//! free-text `SELECT`. Nothing here writes, and no call holds a transaction
//! open across operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{QueryError, StoreError};
use crate::models::PeriodStats;
use crate::store::{Row, SqlParam, Store};

pub mod guard;

// ---

/// Metric columns a caller may project. Names outside this list never reach
/// the SQL text, since column identifiers cannot be parameter-bound.
pub const ALLOWED_METRICS: [&str; 9] = [
    "temperature_c",
    "humidity_pct",
    "pressure_hpa",
    "pm25",
    "pm10",
    "wind_speed_ms",
    "wind_dir_deg",
    "battery_v",
    "rssi",
];

pub const DEFAULT_RANGE_LIMIT: u32 = 100;
pub const MAX_RANGE_LIMIT: u32 = 500;

/// Optional filters for [`ReadingsRepository::query_range`].
#[derive(Debug, Clone, Default)]
pub struct RangeOptions {
    pub device_id: Option<String>,
    pub metrics: Option<Vec<String>>,
    /// Defaults to 100; anything above 500 is capped.
    pub limit: Option<u32>,
}

/// Two windows' statistics side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub period1: PeriodStats,
    pub period2: PeriodStats,
}

/// Read-only repository over a borrowed [`Store`].
pub struct ReadingsRepository<'a> {
    store: &'a dyn Store,
}

impl<'a> ReadingsRepository<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Most recent reading overall, or the most recent one for `device_id`.
    /// An empty store yields no rows.
    pub async fn get_latest(&self, device_id: Option<&str>) -> Result<Vec<Row>, QueryError> {
        // ---
        let rows = match device_id {
            Some(id) => {
                self.store
                    .query(
                        "SELECT * FROM readings WHERE device_id = $1 \
                         ORDER BY recorded_at DESC, id DESC LIMIT 1",
                        &[SqlParam::from(id)],
                    )
                    .await?
            }
            None => {
                self.store
                    .query(
                        "SELECT * FROM readings ORDER BY recorded_at DESC, id DESC LIMIT 1",
                        &[],
                    )
                    .await?
            }
        };
        Ok(rows)
    }

    /// Readings with `recorded_at` in `[start, end]`, newest first.
    pub async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        opts: &RangeOptions,
    ) -> Result<Vec<Row>, QueryError> {
        // ---
        let columns = projection(opts.metrics.as_deref());
        let limit = opts
            .limit
            .unwrap_or(DEFAULT_RANGE_LIMIT)
            .min(MAX_RANGE_LIMIT);

        let mut params: Vec<SqlParam> = vec![start.into(), end.into()];
        let mut sql = format!(
            "SELECT {columns} FROM readings WHERE recorded_at >= $1 AND recorded_at <= $2"
        );

        if let Some(id) = &opts.device_id {
            params.push(id.as_str().into());
            sql.push_str(&format!(" AND device_id = ${}", params.len()));
        }

        params.push(i64::from(limit).into());
        sql.push_str(&format!(" ORDER BY recorded_at DESC LIMIT ${}", params.len()));

        Ok(self.store.query(&sql, &params).await?)
    }

    /// Aggregates over `[start, end]` tagged with `label`.
    pub async fn get_period_stats(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        label: &str,
        device_id: Option<&str>,
    ) -> Result<PeriodStats, QueryError> {
        // ---
        let mut params: Vec<SqlParam> = vec![label.into(), start.into(), end.into()];
        let mut sql = String::from(
            "SELECT \
                 $1::text AS period, \
                 AVG(temperature_c) AS avg_temperature, \
                 MIN(temperature_c) AS min_temperature, \
                 MAX(temperature_c) AS max_temperature, \
                 AVG(humidity_pct) AS avg_humidity, \
                 AVG(pm25) AS avg_pm25, \
                 MAX(pm25) AS max_pm25, \
                 COUNT(*) AS reading_count \
             FROM readings \
             WHERE recorded_at >= $2 AND recorded_at <= $3",
        );

        if let Some(id) = device_id {
            params.push(id.into());
            sql.push_str(" AND device_id = $4");
        }

        let row = self.store.query(&sql, &params).await?.into_iter().next();
        let Some(row) = row else {
            return Ok(PeriodStats {
                period: label.to_string(),
                avg_temperature: None,
                min_temperature: None,
                max_temperature: None,
                avg_humidity: None,
                avg_pm25: None,
                max_pm25: None,
                reading_count: 0,
            });
        };

        serde_json::from_value(serde_json::Value::Object(row))
            .map_err(|e| QueryError::Store(StoreError::RowShape(e.to_string())))
    }

    /// Statistics for two windows, fetched concurrently.
    pub async fn compare_periods(
        &self,
        period1: (DateTime<Utc>, DateTime<Utc>),
        period2: (DateTime<Utc>, DateTime<Utc>),
        device_id: Option<&str>,
    ) -> Result<PeriodComparison, QueryError> {
        // ---
        let (period1, period2) = tokio::try_join!(
            self.get_period_stats(period1.0, period1.1, "period1", device_id),
            self.get_period_stats(period2.0, period2.1, "period2", device_id),
        )?;
        Ok(PeriodComparison { period1, period2 })
    }

    /// Run caller-supplied SQL after it passes [`guard::prepare`], inside a
    /// read-only transaction.
    pub async fn execute_raw_query(&self, query: &str) -> Result<Vec<Row>, QueryError> {
        // ---
        let sql = guard::prepare(query).map_err(|reason| {
            tracing::warn!(rule = %reason, "raw query rejected");
            QueryError::Rejected(reason)
        })?;

        Ok(self.store.query_read_only(&sql, &[]).await?)
    }
}

/// Column list for a range query: identity columns plus the whitelisted
/// metrics, or `*` when no valid metric was requested.
fn projection(metrics: Option<&[String]>) -> String {
    // ---
    let mut picked: Vec<&str> = Vec::new();
    for metric in metrics.unwrap_or_default() {
        match ALLOWED_METRICS.iter().find(|m| **m == metric.as_str()) {
            Some(m) if !picked.contains(m) => picked.push(*m),
            Some(_) => {}
            None => tracing::debug!("dropping unknown metric from projection"),
        }
    }

    if picked.is_empty() {
        return "*".to_string();
    }

    let mut columns = vec!["id", "device_id", "recorded_at"];
    columns.extend(picked);
    columns.join(", ")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::RejectReason;
    use crate::store::testing::RecordingStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_latest_overall_and_per_device() {
        // ---
        let store = RecordingStore::new();
        let repo = ReadingsRepository::new(&store);

        repo.get_latest(None).await.unwrap();
        repo.get_latest(Some("station-01")).await.unwrap();

        let calls = store.calls();
        assert!(calls[0].0.ends_with("ORDER BY recorded_at DESC, id DESC LIMIT 1"));
        assert!(calls[0].1.is_empty());
        assert!(calls[1].0.contains("WHERE device_id = $1"));
        assert_eq!(calls[1].1, vec![SqlParam::from("station-01")]);
    }

    #[tokio::test]
    async fn test_latest_on_empty_store_is_empty() {
        // ---
        let store = RecordingStore::new();
        let rows = ReadingsRepository::new(&store).get_latest(None).await.unwrap();

        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_range_projects_only_whitelisted_metrics() {
        // ---
        let store = RecordingStore::new();
        let (start, end) = window();
        let opts = RangeOptions {
            metrics: Some(vec![
                "temperature_c".to_string(),
                "; DROP TABLE readings".to_string(),
            ]),
            ..RangeOptions::default()
        };

        ReadingsRepository::new(&store)
            .query_range(start, end, &opts)
            .await
            .unwrap();

        let sql = store.last_sql();
        assert!(sql.starts_with("SELECT id, device_id, recorded_at, temperature_c FROM readings"));
        assert!(!sql.contains("DROP"));
    }

    #[tokio::test]
    async fn test_range_binds_filters_and_caps_limit() {
        // ---
        let store = RecordingStore::new();
        let (start, end) = window();
        let opts = RangeOptions {
            device_id: Some("station-01".to_string()),
            metrics: None,
            limit: Some(10_000),
        };

        ReadingsRepository::new(&store)
            .query_range(start, end, &opts)
            .await
            .unwrap();

        let (sql, params) = store.calls().pop().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM readings WHERE recorded_at >= $1 AND recorded_at <= $2 \
             AND device_id = $3 ORDER BY recorded_at DESC LIMIT $4"
        );
        assert_eq!(params[0], SqlParam::from(start));
        assert_eq!(params[1], SqlParam::from(end));
        assert_eq!(params[2], SqlParam::from("station-01"));
        assert_eq!(params[3], SqlParam::Int(Some(500)));
    }

    #[tokio::test]
    async fn test_range_default_limit() {
        // ---
        let store = RecordingStore::new();
        let (start, end) = window();

        ReadingsRepository::new(&store)
            .query_range(start, end, &RangeOptions::default())
            .await
            .unwrap();

        let (sql, params) = store.calls().pop().unwrap();
        assert!(sql.ends_with("LIMIT $3"));
        assert_eq!(params[2], SqlParam::Int(Some(100)));
    }

    #[test]
    fn test_projection_dedupes_and_falls_back_to_star() {
        // ---
        let metrics = vec!["pm25".to_string(), "pm25".to_string(), "rssi".to_string()];
        assert_eq!(projection(Some(&metrics)), "id, device_id, recorded_at, pm25, rssi");

        let bogus = vec!["password".to_string()];
        assert_eq!(projection(Some(&bogus)), "*");
        assert_eq!(projection(None), "*");
    }

    #[tokio::test]
    async fn test_period_stats_binds_label_and_decodes_row() {
        // ---
        let store = RecordingStore::new();
        store.respond_rows(vec![json!({
            "period": "today",
            "avg_temperature": 12.5,
            "min_temperature": 4.1,
            "max_temperature": 19.8,
            "avg_humidity": 66.2,
            "avg_pm25": 21.7,
            "max_pm25": 64,
            "reading_count": 288
        })]);
        let (start, end) = window();

        let stats = ReadingsRepository::new(&store)
            .get_period_stats(start, end, "today'; DROP TABLE readings; --", Some("station-01"))
            .await
            .unwrap();

        assert_eq!(stats.reading_count, 288);
        assert_eq!(stats.max_pm25, Some(64.0));

        let (sql, params) = store.calls().pop().unwrap();
        assert!(!sql.contains("today"));
        assert!(sql.ends_with("AND device_id = $4"));
        assert_eq!(params[0], SqlParam::from("today'; DROP TABLE readings; --"));
    }

    #[tokio::test]
    async fn test_period_stats_for_empty_window() {
        // ---
        let store = RecordingStore::new();
        store.respond_rows(vec![json!({
            "period": "period1",
            "avg_temperature": null,
            "min_temperature": null,
            "max_temperature": null,
            "avg_humidity": null,
            "avg_pm25": null,
            "max_pm25": null,
            "reading_count": 0
        })]);
        let (start, end) = window();

        let stats = ReadingsRepository::new(&store)
            .get_period_stats(start, end, "period1", None)
            .await
            .unwrap();

        assert_eq!(stats.reading_count, 0);
        assert_eq!(stats.avg_temperature, None);
    }

    #[tokio::test]
    async fn test_compare_periods_labels_both_windows() {
        // ---
        let store = RecordingStore::new();
        let (start, end) = window();

        let cmp = ReadingsRepository::new(&store)
            .compare_periods((start, end), (start, end), None)
            .await
            .unwrap();

        assert_eq!(cmp.period1.period, "period1");
        assert_eq!(cmp.period2.period, "period2");
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_raw_query_appends_limit_before_execution() {
        // ---
        let store = RecordingStore::new();

        ReadingsRepository::new(&store)
            .execute_raw_query("SELECT * FROM readings WHERE temperature_c > 15")
            .await
            .unwrap();

        assert_eq!(
            store.last_sql(),
            "SELECT * FROM readings WHERE temperature_c > 15 LIMIT 100"
        );
        assert_eq!(
            store.read_only_calls(),
            vec!["SELECT * FROM readings WHERE temperature_c > 15 LIMIT 100"]
        );
    }

    #[tokio::test]
    async fn test_fixed_shape_reads_skip_the_read_only_path() {
        // ---
        let store = RecordingStore::new();

        ReadingsRepository::new(&store).get_latest(None).await.unwrap();

        assert_eq!(store.calls().len(), 1);
        assert!(store.read_only_calls().is_empty());
    }

    #[tokio::test]
    async fn test_escape_string_smuggling_never_reaches_the_store() {
        // ---
        let store = RecordingStore::new();
        let repo = ReadingsRepository::new(&store);

        let err = repo
            .execute_raw_query("SELECT E'\\'', 1 INTO stolen --'")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Rejected(RejectReason::ForbiddenKeyword("into"))));

        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_queries_never_reach_the_store() {
        // ---
        let store = RecordingStore::new();
        let repo = ReadingsRepository::new(&store);

        let err = repo.execute_raw_query("DELETE FROM readings").await.unwrap_err();
        assert!(matches!(err, QueryError::Rejected(RejectReason::NotSelect)));

        let err = repo
            .execute_raw_query("SELECT * FROM readings; DROP TABLE readings")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Rejected(RejectReason::ForbiddenKeyword("drop"))));

        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_are_not_rejections() {
        // ---
        let store = RecordingStore::new();
        store.respond(Err(StoreError::Database(sqlx::Error::PoolTimedOut)));

        let err = ReadingsRepository::new(&store)
            .execute_raw_query("SELECT 1")
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Store(_)));
    }
}
