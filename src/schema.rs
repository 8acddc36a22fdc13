//! Database schema management for `home-weather-collector`.
//!
//! Ensures the time-series table exists before the first point is written.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the `home_readings` table and its index (idempotent).
///
/// One row per point: `fields` holds the flat field mapping as JSONB, and
/// `location` is constrained to the two location tags.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS home_readings (
            id          BIGSERIAL   PRIMARY KEY,
            time        TIMESTAMPTZ NOT NULL,
            measurement TEXT        NOT NULL,
            location    TEXT        NOT NULL CHECK (location IN ('in', 'out')),
            fields      JSONB       NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_home_readings_measurement_time
            ON home_readings (measurement, location, time);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
