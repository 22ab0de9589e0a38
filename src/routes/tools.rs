// src/routes/tools.rs
//! Tool endpoints for the tool-calling loop.
//!
//! Each tool is a thin `POST` wrapper over [`ReadingsRepository`]. The
//! definitions served by `GET /tools` carry the parameter schemas an agent
//! framework registers; their names, optionality and defaults must not drift
//! from the request types below.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use crate::query::{PeriodComparison, RangeOptions, ReadingsRepository, DEFAULT_RANGE_LIMIT};
use crate::store::{Row, Store};

// ---

const DEVICE_ID_DESCRIPTION: &str = "Specific device ID (defaults to all devices)";

#[derive(Debug, Deserialize)]
struct GetCurrentRequest {
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryRangeRequest {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    device_id: Option<String>,
    metrics: Option<Vec<String>>,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_RANGE_LIMIT
}

#[derive(Debug, Deserialize)]
struct ComparePeriodsRequest {
    period1_start: DateTime<Utc>,
    period1_end: DateTime<Utc>,
    period2_start: DateTime<Utc>,
    period2_end: DateTime<Utc>,
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteSqlRequest {
    query: String,
}

/// One entry of `GET /tools`.
#[derive(Debug, Serialize)]
struct ToolDefinition {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

pub fn router() -> Router<Arc<dyn Store>> {
    // ---
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/get_current", post(get_current))
        .route("/tools/query_range", post(query_range))
        .route("/tools/compare_periods", post(compare_periods))
        .route("/tools/execute_sql", post(execute_sql))
}

async fn list_tools() -> Json<Vec<ToolDefinition>> {
    Json(tool_definitions())
}

async fn get_current(
    State(store): State<Arc<dyn Store>>,
    req: Result<Json<GetCurrentRequest>, JsonRejection>,
) -> Result<Json<Vec<Row>>, ApiError> {
    // ---
    let Json(req) = req?;
    tracing::debug!(device_id = ?req.device_id, "tool get_current");

    let rows = ReadingsRepository::new(store.as_ref())
        .get_latest(req.device_id.as_deref())
        .await?;
    Ok(Json(rows))
}

async fn query_range(
    State(store): State<Arc<dyn Store>>,
    req: Result<Json<QueryRangeRequest>, JsonRejection>,
) -> Result<Json<Vec<Row>>, ApiError> {
    // ---
    let Json(req) = req?;
    tracing::debug!(start = %req.start, end = %req.end, limit = req.limit, "tool query_range");

    let opts = RangeOptions {
        device_id: req.device_id,
        metrics: req.metrics,
        limit: Some(req.limit),
    };
    let rows = ReadingsRepository::new(store.as_ref())
        .query_range(req.start, req.end, &opts)
        .await?;
    Ok(Json(rows))
}

async fn compare_periods(
    State(store): State<Arc<dyn Store>>,
    req: Result<Json<ComparePeriodsRequest>, JsonRejection>,
) -> Result<Json<PeriodComparison>, ApiError> {
    // ---
    let Json(req) = req?;
    tracing::debug!("tool compare_periods");

    let cmp = ReadingsRepository::new(store.as_ref())
        .compare_periods(
            (req.period1_start, req.period1_end),
            (req.period2_start, req.period2_end),
            req.device_id.as_deref(),
        )
        .await?;
    Ok(Json(cmp))
}

async fn execute_sql(
    State(store): State<Arc<dyn Store>>,
    req: Result<Json<ExecuteSqlRequest>, JsonRejection>,
) -> Result<Json<Vec<Row>>, ApiError> {
    // ---
    let Json(req) = req?;
    tracing::debug!("tool execute_sql");

    let rows = ReadingsRepository::new(store.as_ref())
        .execute_raw_query(&req.query)
        .await?;
    Ok(Json(rows))
}

fn tool_definitions() -> Vec<ToolDefinition> {
    // ---
    vec![
        ToolDefinition {
            name: "get_current",
            description: "Get the latest/current weather readings from the station. \
                          Returns the most recent sensor data.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "device_id": { "type": "string", "description": DEVICE_ID_DESCRIPTION }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "query_range",
            description: "Query weather readings within a specific time range. \
                          Returns readings between start and end times.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "start": {
                        "type": "string",
                        "description": "Start time in ISO 8601 format (e.g., 2024-01-15T00:00:00Z)"
                    },
                    "end": {
                        "type": "string",
                        "description": "End time in ISO 8601 format (e.g., 2024-01-15T23:59:59Z)"
                    },
                    "device_id": { "type": "string", "description": DEVICE_ID_DESCRIPTION },
                    "metrics": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Specific metrics to return (e.g., [\"temperature_c\", \"humidity_pct\"])"
                    },
                    "limit": {
                        "type": "number",
                        "default": DEFAULT_RANGE_LIMIT,
                        "description": "Maximum number of readings to return (default 100)"
                    }
                },
                "required": ["start", "end"]
            }),
        },
        ToolDefinition {
            name: "compare_periods",
            description: "Compare weather statistics between two time periods. \
                          Useful for \"today vs yesterday\" or week-over-week comparisons.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "period1_start": { "type": "string", "description": "Start of first period (ISO 8601)" },
                    "period1_end": { "type": "string", "description": "End of first period (ISO 8601)" },
                    "period2_start": { "type": "string", "description": "Start of second period (ISO 8601)" },
                    "period2_end": { "type": "string", "description": "End of second period (ISO 8601)" },
                    "device_id": { "type": "string", "description": DEVICE_ID_DESCRIPTION }
                },
                "required": ["period1_start", "period1_end", "period2_start", "period2_end"]
            }),
        },
        ToolDefinition {
            name: "execute_sql",
            description: "Execute a custom SQL query against the weather database. \
                          Only SELECT queries are allowed. \
                          Use for complex queries not covered by other tools.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL SELECT query to execute" }
                },
                "required": ["query"]
            }),
        },
    ]
}
