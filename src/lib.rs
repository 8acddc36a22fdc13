//! Indoor and outdoor weather collection for a single home.
//!
//! One run reads the indoor sensors and the OpenWeatherMap API, normalizes
//! everything into [`TimeSeriesPoint`]s tagged `in` or `out`, and writes
//! them to a PostgreSQL time-series table. See [`pipeline::Collector`].

pub mod classify;
pub mod config;
pub mod indoor;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod weather;

pub use classify::{classify, RainClassification};
pub use config::Config;
pub use models::{FieldValue, Fields, Location, Measurement, TimeSeriesPoint};
pub use pipeline::{Collector, RunReport};
