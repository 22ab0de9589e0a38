//! Configuration loader for the `zephyr-station` service.
//!
//! All runtime settings and their defaults live here, loaded from environment
//! variables (the caller handles the optional `.env` file). Nothing else in
//! the crate reads `env::var` for configuration.
use std::env;
use std::net::SocketAddr;

use anyhow::{anyhow, bail, Result};
use chrono::FixedOffset;

use crate::generator::{Interval, Patterns, SeriesConfig, WalkMode};
use crate::seed::{default_device, SeedConfig, DEFAULT_BATCH_SIZE};

/// Ten years of history; one device at 1m is about 5.3M readings.
pub const MAX_SEED_DAYS: u32 = 3650;

/// Parse an optional environment variable into `$ty`, falling back to a
/// default when unset.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// Immutable after loading; the seed subcommand may override individual
/// seed fields from the command line before building a [`SeedConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// Days of history the seeder generates.
    pub seed_days: u32,

    pub seed_interval: Interval,

    /// Per-tick probability of a dropped sample, within `[0, 1]`.
    pub seed_gap_probability: f64,

    /// Rows per multi-row insert.
    pub seed_batch_size: usize,

    /// Station-local offset from UTC used by the diurnal models.
    pub seed_utc_offset_hours: i32,

    /// Fixed RNG seed for reproducible runs.
    pub seed_rng_seed: Option<u64>,

    pub seed_walk_mode: WalkMode,
}

/// Load configuration from process environment variables.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
/// - `SEED_DAYS` (7), `SEED_INTERVAL` (`5m`), `SEED_GAP_PROBABILITY` (0.02),
///   `SEED_BATCH_SIZE` (500), `SEED_UTC_OFFSET_HOURS` (0), `SEED_RNG_SEED`,
///   `SEED_WALK_MODE` (`per-device`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|key| env::var(key).ok())
}

/// Load configuration through an arbitrary key lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let db_url = require_env!(lookup, "DATABASE_URL");
    let db_pool_max = parse_env!(lookup, "DB_POOL_MAX", u32, 5);
    let bind_addr = parse_env!(
        lookup,
        "BIND_ADDR",
        SocketAddr,
        SocketAddr::from(([0, 0, 0, 0], 8080))
    );
    let seed_days = parse_env!(lookup, "SEED_DAYS", u32, 7);
    let seed_interval = parse_env!(lookup, "SEED_INTERVAL", Interval, Interval::FiveMinutes);
    let seed_gap_probability = parse_env!(lookup, "SEED_GAP_PROBABILITY", f64, 0.02);
    let seed_batch_size = parse_env!(lookup, "SEED_BATCH_SIZE", usize, DEFAULT_BATCH_SIZE);
    let seed_utc_offset_hours = parse_env!(lookup, "SEED_UTC_OFFSET_HOURS", i32, 0);
    let seed_rng_seed = lookup("SEED_RNG_SEED")
        .map(|v| v.trim().parse::<u64>())
        .transpose()
        .map_err(|e| anyhow!("Invalid SEED_RNG_SEED: {}", e))?;
    let seed_walk_mode = parse_env!(lookup, "SEED_WALK_MODE", WalkMode, WalkMode::PerDevice);

    let cfg = Config {
        db_url,
        db_pool_max,
        bind_addr,
        seed_days,
        seed_interval,
        seed_gap_probability,
        seed_batch_size,
        seed_utc_offset_hours,
        seed_rng_seed,
        seed_walk_mode,
    };
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.db_pool_max == 0 {
            bail!("Invalid DB_POOL_MAX: must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.seed_gap_probability) {
            bail!(
                "Invalid SEED_GAP_PROBABILITY: {} is not within [0, 1]",
                self.seed_gap_probability
            );
        }
        if self.seed_days > MAX_SEED_DAYS {
            bail!(
                "Invalid SEED_DAYS: {} exceeds the maximum of {}",
                self.seed_days,
                MAX_SEED_DAYS
            );
        }
        if self.seed_batch_size == 0 {
            bail!("Invalid SEED_BATCH_SIZE: must be greater than 0");
        }
        self.local_offset()?;
        Ok(())
    }

    fn local_offset(&self) -> Result<FixedOffset> {
        self.seed_utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                anyhow!(
                    "Invalid SEED_UTC_OFFSET_HOURS: {} is out of range",
                    self.seed_utc_offset_hours
                )
            })
    }

    /// Build the reseed configuration for the single default station.
    pub fn seed_config(&self) -> Result<SeedConfig> {
        // ---
        self.validate()?;
        Ok(SeedConfig {
            devices: vec![default_device()],
            series: SeriesConfig {
                days: self.seed_days,
                interval: self.seed_interval,
                gap_probability: self.seed_gap_probability,
                patterns: Patterns::default(),
                walk_mode: self.seed_walk_mode,
                local_offset: self.local_offset()?,
            },
            batch_size: self.seed_batch_size,
        })
    }

    /// Log the loaded configuration with the database password masked.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL          : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX           : {}", self.db_pool_max);
        tracing::info!("  BIND_ADDR             : {}", self.bind_addr);
        tracing::info!("  SEED_DAYS             : {}", self.seed_days);
        tracing::info!("  SEED_INTERVAL         : {}", self.seed_interval);
        tracing::info!("  SEED_GAP_PROBABILITY  : {}", self.seed_gap_probability);
        tracing::info!("  SEED_BATCH_SIZE       : {}", self.seed_batch_size);
        tracing::info!("  SEED_UTC_OFFSET_HOURS : {}", self.seed_utc_offset_hours);
        tracing::info!("  SEED_RNG_SEED         : {:?}", self.seed_rng_seed);
        tracing::info!("  SEED_WALK_MODE        : {:?}", self.seed_walk_mode);
    }
}

/// Replace the password in `user:password@host` with `****`.
pub fn mask_db_url(db_url: &str) -> String {
    // ---
    let Some(at_pos) = db_url.rfind('@') else {
        return db_url.to_string();
    };
    match db_url[..at_pos].rfind(':') {
        // `postgres://host` has a scheme colon but no credentials
        Some(colon_pos) if !db_url[colon_pos..].starts_with("://") => {
            format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..])
        }
        _ => db_url.to_string(),
    }
}
