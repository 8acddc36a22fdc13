//! Point persistence.
//!
//! [`persist`] logs the point and then hands it to a [`PointWriter`]. The log
//! line is written whether or not the write succeeds. There is no batching
//! and no retry: a failed write is returned to the caller as is.

use anyhow::{Context as _, Result};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use crate::models::TimeSeriesPoint;

// ---

/// Destination of time-series points.
#[allow(async_fn_in_trait)]
pub trait PointWriter {
    async fn write(&self, point: &TimeSeriesPoint) -> Result<()>;
}

/// `<timestamp> <measurement> [<location>] <fields>`
pub fn log_line(point: &TimeSeriesPoint) -> String {
    format!(
        "{} {} [{}] {}",
        point.iso_timestamp(),
        point.measurement,
        point.location,
        point.fields
    )
}

/// Log the point, then write it.
pub async fn persist<S: PointWriter>(writer: &S, point: &TimeSeriesPoint) -> Result<()> {
    // ---
    info!("{}", log_line(point));

    writer.write(point).await.with_context(|| {
        format!(
            "failed to write {} [{}] at {}",
            point.measurement,
            point.location,
            point.iso_timestamp()
        )
    })
}

/// Writes points into the `home_readings` table.
#[derive(Debug, Clone)]
pub struct PgPointWriter {
    pool: PgPool,
}

impl PgPointWriter {
    pub fn new(pool: PgPool) -> Self {
        PgPointWriter { pool }
    }
}

impl PointWriter for PgPointWriter {
    async fn write(&self, point: &TimeSeriesPoint) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO home_readings (time, measurement, location, fields)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(point.timestamp)
        .bind(point.measurement.as_str())
        .bind(point.location.as_str())
        .bind(Json(&point.fields))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
