//! Database schema management for `zephyr-station`.
//!
//! Ensures the `devices` and `readings` tables and their indexes exist
//! before serving or seeding. Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

const STATEMENTS: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id           TEXT PRIMARY KEY,
        name         TEXT NOT NULL,
        location     TEXT,
        installed_at TIMESTAMP,
        is_active    BOOLEAN DEFAULT true
    );
    "#,
    // Seeding supplies explicit ids; ingest lets the identity assign them.
    r#"
    CREATE TABLE IF NOT EXISTS readings (
        id            INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        device_id     TEXT      NOT NULL REFERENCES devices (id),
        recorded_at   TIMESTAMP NOT NULL,
        temperature_c DECIMAL(4,1),
        humidity_pct  DECIMAL(4,1),
        pressure_hpa  DECIMAL(6,1),
        pm25          INTEGER,
        pm10          INTEGER,
        wind_speed_ms DECIMAL(4,1),
        wind_dir_deg  INTEGER,
        battery_v     DECIMAL(3,2),
        rssi          INTEGER
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_readings_device_recorded
        ON readings (device_id, recorded_at DESC);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_readings_recorded
        ON readings (recorded_at DESC);
    "#,
];

/// Create the schema if it does not exist yet (idempotent).
///
/// Runs in one transaction, so a failure leaves no partial schema behind.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    for statement in STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::info!("database schema ready");
    Ok(())
}
