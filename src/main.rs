//! Entry point for the `home-weather-collector` binary.
//!
//! Performs exactly one collection run and exits; scheduling is left to cron
//! or a systemd timer. The startup sequence is:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection and creating the schema
//! - Running the indoor phase, then the outdoor phase
//!
//! # Environment Variables
//! See [`home_weather_collector::config::load_from_env`] for the collector
//! settings. Logging is controlled by:
//! - `RUST_LOG` (optional) – full `EnvFilter` directive, wins if set
//! - `LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `FORCE_COLOR` (optional) – force ANSI colors on or off
use std::{env, io::IsTerminal};

use anyhow::{Context as _, Result};
use chrono::Utc;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;

use home_weather_collector::indoor::{IioPressureSensor, ProcessDeviceReader};
use home_weather_collector::store::PgPointWriter;
use home_weather_collector::weather::OpenWeatherMap;
use home_weather_collector::{config, schema, Collector};

// ---

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .context("Failed to connect to database")?;

    schema::create_schema(&pool)
        .await
        .context("Failed to create schema")?;

    let collector = Collector::new(
        IioPressureSensor::new(&cfg),
        ProcessDeviceReader::new(&cfg),
        OpenWeatherMap::new(&cfg),
        PgPointWriter::new(pool.clone()),
    );

    let report = collector.run(Utc::now()).await;
    tracing::info!(
        "Run finished: indoor {}, outdoor {}",
        if report.indoor.is_ok() { "ok" } else { "failed" },
        if report.outdoor.is_ok() { "ok" } else { "failed" },
    );

    pool.close().await;
    Ok(())
}

// ---

/// Initialize the global tracing subscriber.
///
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Log level from `RUST_LOG`, else `LOG_LEVEL`, else `info`
fn init_tracing() {
    // ---
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
