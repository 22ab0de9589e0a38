//! Application entry point for the `zephyr-station` backend service.
//!
//! Two subcommands share one startup sequence (configuration, logging, a
//! Postgres-backed store, schema creation):
//! - `serve` (default) mounts the tool, ingest and health routes and serves
//!   HTTP until Ctrl-C.
//! - `seed` wipes the store and reloads it with a synthetic series.
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX`, `BIND_ADDR`, `SEED_*` – see [`config`]
//! - `ZEPHYR_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `ZEPHYR_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

mod config;
mod error;
mod generator;
mod models;
mod query;
mod routes;
mod schema;
mod seed;
mod store;

use config::Config;
use generator::Interval;
use store::{PgStore, Store};

// ---

#[derive(Parser)]
#[command(
    name = "zephyr-station",
    about = "Weather station backend: synthetic seeding and guarded read-only tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Clear the store and reload it with generated readings
    Seed {
        /// Days of history to generate
        #[arg(long)]
        days: Option<u32>,
        /// Sampling interval: 1m, 5m or 15m
        #[arg(long)]
        interval: Option<Interval>,
        /// Per-tick probability of a dropped sample
        #[arg(long)]
        gap_probability: Option<f64>,
        /// Fixed RNG seed for a reproducible dataset
        #[arg(long)]
        rng_seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = config::load_from_env()?;

    if let Some(Commands::Seed {
        days,
        interval,
        gap_probability,
        rng_seed,
    }) = &cli.command
    {
        cfg.seed_days = days.unwrap_or(cfg.seed_days);
        cfg.seed_interval = interval.unwrap_or(cfg.seed_interval);
        cfg.seed_gap_probability = gap_probability.unwrap_or(cfg.seed_gap_probability);
        cfg.seed_rng_seed = rng_seed.or(cfg.seed_rng_seed);
        cfg.validate()?;
    }
    cfg.log_config();

    tracing::info!(
        "Attempting to connect to database: {}",
        config::mask_db_url(&cfg.db_url)
    );
    let pg = PgStore::connect(&cfg.db_url, cfg.db_pool_max)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Successfully connected to database");

    schema::create_schema(pg.pool()).await?;

    let store: Arc<dyn Store> = Arc::new(pg);
    let outcome = match cli.command {
        Some(Commands::Seed { .. }) => run_seed(store.as_ref(), &cfg).await,
        Some(Commands::Serve) | None => serve(store.clone(), &cfg).await,
    };

    store.close().await;
    tracing::info!("store closed");
    outcome
}

async fn serve(store: Arc<dyn Store>, cfg: &Config) -> Result<()> {
    // ---
    let app = routes::router(store);

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

async fn run_seed(store: &dyn Store, cfg: &Config) -> Result<()> {
    // ---
    let seed_cfg = cfg.seed_config()?;
    let mut rng = match cfg.seed_rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = seed::reseed(store, &seed_cfg, &mut rng, Utc::now()).await?;
    tracing::info!(
        devices = report.devices,
        readings = report.readings_written,
        "seed complete"
    );

    let sample = store
        .query(
            "SELECT * FROM readings ORDER BY recorded_at DESC, id DESC LIMIT 3",
            &[],
        )
        .await?;
    for row in sample {
        tracing::info!("sample reading: {}", serde_json::Value::Object(row));
    }

    Ok(())
}

// ---

/// Install the global subscriber. Filter comes from `RUST_LOG`, else
/// `ZEPHYR_LOG_LEVEL` (default `debug`), with sqlx statement logs held at
/// `warn` so a reseed does not print every batch insert.
/// `ZEPHYR_SPAN_EVENTS=full|enter_exit` widens span events beyond CLOSE, and
/// `FORCE_COLOR` overrides TTY detection.
fn init_tracing() {
    // ---
    let span_events = match env::var("ZEPHYR_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to ZEPHYR_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("ZEPHYR_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
