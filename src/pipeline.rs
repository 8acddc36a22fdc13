//! Run orchestration.
//!
//! One run is two phases executed one after the other: indoor, then outdoor.
//! Each phase is its own error boundary. A failure anywhere inside a phase
//! is logged and ends that phase only; the other phase still runs.
//!
//! Points are written in a fixed order: indoor pressure, humidity,
//! temperature, then outdoor pressure, humidity, temperature, rain, UV, then
//! forecast points in source order.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::indoor::{collect_indoor, DeviceReader, PressureSensor};
use crate::models::{Location, TimeSeriesPoint};
use crate::store::{persist, PointWriter};
use crate::weather::{fetch_outdoor, WeatherSource};

// ---

/// Outcome of both phases of one run.
#[derive(Debug)]
pub struct RunReport {
    pub indoor: Result<()>,
    pub outdoor: Result<()>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.indoor.is_ok() && self.outdoor.is_ok()
    }
}

/// Wires the four collaborators of a run together.
pub struct Collector<P, D, W, S> {
    pressure: P,
    device: D,
    weather: W,
    writer: S,
}

impl<P, D, W, S> Collector<P, D, W, S>
where
    P: PressureSensor,
    D: DeviceReader,
    W: WeatherSource,
    S: PointWriter,
{
    pub fn new(pressure: P, device: D, weather: W, writer: S) -> Self {
        Collector {
            pressure,
            device,
            weather,
            writer,
        }
    }

    /// Run both phases. `now` stamps every current reading.
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        // ---
        info!("Collecting readings for {}", now.to_rfc3339());

        let indoor = self.indoor_phase(now).await;
        if let Err(e) = &indoor {
            error!("Indoor collection failed: {:#}", e);
        }

        let outdoor = self.outdoor_phase(now).await;
        if let Err(e) = &outdoor {
            error!("Outdoor collection failed: {:#}", e);
        }

        RunReport { indoor, outdoor }
    }

    async fn indoor_phase(&self, now: DateTime<Utc>) -> Result<()> {
        // ---
        let snapshot = collect_indoor(&self.pressure, &self.device).await?;

        let points = [
            TimeSeriesPoint::pressure(Location::Indoor, snapshot.pressure, now),
            TimeSeriesPoint::humidity(Location::Indoor, snapshot.humidity, now),
            TimeSeriesPoint::temperature(Location::Indoor, snapshot.temperature, now),
        ];
        for point in &points {
            persist(&self.writer, point).await?;
        }

        Ok(())
    }

    async fn outdoor_phase(&self, now: DateTime<Utc>) -> Result<()> {
        // ---
        let report = fetch_outdoor(&self.weather).await;

        match &report.current {
            Some(current) => {
                let points = [
                    TimeSeriesPoint::pressure(Location::Outdoor, current.pressure, now),
                    TimeSeriesPoint::humidity(Location::Outdoor, current.humidity, now),
                    TimeSeriesPoint::temperature(Location::Outdoor, current.temperature, now),
                    TimeSeriesPoint::rain(current.rain, now),
                ];
                for point in &points {
                    persist(&self.writer, point).await?;
                }
            }
            None => warn!("No current weather, skipping outdoor conditions"),
        }

        match report.uvi {
            Some(uvi) => persist(&self.writer, &TimeSeriesPoint::uvi(uvi, now)).await?,
            None => warn!("No UV index, skipping"),
        }

        match &report.forecast {
            Some(forecast) => {
                for entry in forecast {
                    let point = TimeSeriesPoint::forecast(entry)?;
                    persist(&self.writer, &point).await?;
                }
            }
            None => warn!("No forecast, skipping"),
        }

        Ok(())
    }
}
