//! Clear-then-reload seeding of the store with a synthetic series.
//!
//! Must not run concurrently with live ingest: the clear step deletes every
//! device and reading before the new dataset is written.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::{PersistError, StoreError};
use crate::generator::{build_series, SeriesConfig};
use crate::models::{Device, Reading};
use crate::store::{SqlParam, Store};

// ---

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Postgres accepts at most 65535 bind parameters per statement.
pub const MAX_BATCH_SIZE: usize = 65_535 / COLUMNS_PER_ROW;

const COLUMNS_PER_ROW: usize = 12;

const INSERT_READINGS: &str = "INSERT INTO readings (\
    id, device_id, recorded_at, temperature_c, humidity_pct, pressure_hpa, \
    pm25, pm10, wind_speed_ms, wind_dir_deg, battery_v, rssi) VALUES ";

/// Everything one reseed run needs.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub devices: Vec<Device>,
    pub series: SeriesConfig,
    pub batch_size: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            devices: vec![default_device()],
            series: SeriesConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

pub fn default_device() -> Device {
    Device::new("station-01", "Garden Station", "Backyard, south fence")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub devices: usize,
    pub readings_written: usize,
}

/// Wipe the store and reload it with a freshly generated series.
///
/// The series is generated up front so the only fallible work is I/O. Any
/// failed statement aborts the run; the caller decides whether to retry.
pub async fn reseed<R: Rng>(
    store: &dyn Store,
    cfg: &SeedConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<SeedReport> {
    // ---
    let readings = build_series(rng, &cfg.devices, &cfg.series, now);
    tracing::info!(readings = readings.len(), "generated readings");

    clear(store).await.context("failed to clear existing data")?;
    insert_devices(store, &cfg.devices, now)
        .await
        .context("failed to insert devices")?;

    let written = persist_readings(store, &readings, cfg.batch_size).await?;
    advance_id_sequence(store)
        .await
        .context("failed to advance readings id sequence")?;

    Ok(SeedReport {
        devices: cfg.devices.len(),
        readings_written: written,
    })
}

async fn clear(store: &dyn Store) -> Result<(), StoreError> {
    // ---
    tracing::info!("clearing existing readings and devices");
    store.query("DELETE FROM readings", &[]).await?;
    store.query("DELETE FROM devices", &[]).await?;
    Ok(())
}

/// Register `devices`; one without an installation time is stamped `now`.
async fn insert_devices(
    store: &dyn Store,
    devices: &[Device],
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    // ---
    for device in devices {
        let installed_at = device.installed_at.unwrap_or(now);
        tracing::info!(device_id = %device.id, "registering device");
        store
            .query(
                "INSERT INTO devices (id, name, location, installed_at, is_active) \
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    device.id.as_str().into(),
                    device.name.as_str().into(),
                    device.location.as_str().into(),
                    installed_at.into(),
                    device.is_active.into(),
                ],
            )
            .await?;
    }
    Ok(())
}

/// Write `readings` in multi-row inserts of at most `batch_size` rows.
///
/// Row ids are the 1-based position in `readings`, so they are unique for
/// the whole run. Each batch is one statement and therefore atomic; the
/// first failing batch stops the run.
pub async fn persist_readings(
    store: &dyn Store,
    readings: &[Reading],
    batch_size: usize,
) -> Result<usize, PersistError> {
    // ---
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let mut written = 0;

    for (n, batch) in readings.chunks(batch_size).enumerate() {
        let offset = n * batch_size;
        let (sql, params) = insert_batch(batch, offset);

        store
            .query(&sql, &params)
            .await
            .map_err(|source| PersistError {
                offset,
                size: batch.len(),
                source,
            })?;

        written += batch.len();
        tracing::debug!(written, total = readings.len(), "inserted batch");
    }

    tracing::info!(written, "readings persisted");
    Ok(written)
}

fn insert_batch(batch: &[Reading], offset: usize) -> (String, Vec<SqlParam>) {
    // ---
    let mut params = Vec::with_capacity(batch.len() * COLUMNS_PER_ROW);
    let mut tuples = Vec::with_capacity(batch.len());

    for (idx, r) in batch.iter().enumerate() {
        let base = idx * COLUMNS_PER_ROW;
        let placeholders: Vec<String> = (1..=COLUMNS_PER_ROW)
            .map(|col| format!("${}", base + col))
            .collect();
        tuples.push(format!("({})", placeholders.join(", ")));

        params.extend([
            SqlParam::Int(Some((offset + idx + 1) as i64)),
            r.device_id.as_str().into(),
            r.recorded_at.into(),
            r.temperature_c.into(),
            r.humidity_pct.into(),
            r.pressure_hpa.into(),
            r.pm25.into(),
            r.pm10.into(),
            r.wind_speed_ms.into(),
            r.wind_dir_deg.into(),
            r.battery_v.into(),
            r.rssi.into(),
        ]);
    }

    (format!("{INSERT_READINGS}{}", tuples.join(", ")), params)
}

/// Move the identity past the seeded ids so ingest can keep inserting
/// without supplying one.
async fn advance_id_sequence(store: &dyn Store) -> Result<(), StoreError> {
    // ---
    store
        .query(
            "SELECT setval(pg_get_serial_sequence('readings', 'id'), \
             COALESCE(MAX(id), 0) + 1, false) FROM readings",
            &[],
        )
        .await?;
    Ok(())
}
