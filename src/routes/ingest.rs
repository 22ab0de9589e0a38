// src/routes/ingest.rs
//! `POST /ingest`: accept one reading from a field station.
//!
//! The payload is range-checked, the device is registered on first sight,
//! and the reading is inserted with an identity-assigned id.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::ApiError;
use crate::error::IngestError;
use crate::models::IngestPayload;
use crate::store::Store;

// ---

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    device_id: String,
    timestamp: DateTime<Utc>,
}

pub fn router() -> Router<Arc<dyn Store>> {
    // ---
    Router::new().route("/ingest", post(handler))
}

async fn handler(
    State(store): State<Arc<dyn Store>>,
    payload: Result<Json<IngestPayload>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    // ---
    let Json(payload) = payload?;

    store_ingest(store.as_ref(), &payload).await?;
    tracing::info!(device_id = %payload.device_id, timestamp = %payload.timestamp, "reading ingested");

    Ok(Json(IngestResponse {
        status: "ok",
        device_id: payload.device_id,
        timestamp: payload.timestamp,
    }))
}

/// Validate `payload`, register its device if unknown, and insert the reading.
pub async fn store_ingest(store: &dyn Store, payload: &IngestPayload) -> Result<(), IngestError> {
    // ---
    if let Err(fields) = payload.validate() {
        tracing::info!(failures = fields.len(), "ingest payload failed validation");
        return Err(IngestError::Invalid(fields));
    }

    let r = &payload.readings;

    store
        .query(
            "INSERT INTO devices (id, name) VALUES ($1, $1) ON CONFLICT (id) DO NOTHING",
            &[payload.device_id.as_str().into()],
        )
        .await?;

    store
        .query(
            "INSERT INTO readings (\
                 device_id, recorded_at, temperature_c, humidity_pct, pressure_hpa, \
                 pm25, pm10, wind_speed_ms, wind_dir_deg, battery_v, rssi) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            &[
                payload.device_id.as_str().into(),
                payload.timestamp.into(),
                r.temperature_c.into(),
                r.humidity_pct.into(),
                r.pressure_hpa.into(),
                r.pm25.into(),
                r.pm10.into(),
                r.wind_speed_ms.into(),
                r.wind_dir_deg.into(),
                payload.meta.battery_v.into(),
                payload.meta.rssi.into(),
            ],
        )
        .await?;

    Ok(())
}
