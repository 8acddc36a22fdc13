//! Time-series data model shared by the assemblers and the persister.
//!
//! Every reading, indoor or outdoor, current or forecast, ends up as a
//! [`TimeSeriesPoint`]. Points are only built through the constructors on
//! [`TimeSeriesPoint`], which fix the field schema of each [`Measurement`].

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::classify::RainClassification;
use crate::weather::ForecastPoint;

// ---

/// Named category of a time-series point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Pressure,
    Humidity,
    Temperature,
    Rain,
    Uvi,
    WeatherForecast,
}

impl Measurement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::Pressure => "home_pressure",
            Measurement::Humidity => "home_humidity",
            Measurement::Temperature => "home_temperature",
            Measurement::Rain => "home_rain",
            Measurement::Uvi => "home_uvi",
            Measurement::WeatherForecast => "home_weather_forecast",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location tag of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Indoor,
    Outdoor,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Indoor => "in",
            Location::Outdoor => "out",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value. Fields are flat: no nesting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Debug keeps the trailing `.0` so floats stay recognisable in logs
            FieldValue::Float(v) => write!(f, "{v:?}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered field mapping of a point. Serializes as a flat JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields(Vec<(&'static str, FieldValue)>);

impl Fields {
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.0
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldValue)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

/// The unit written to the time-series store.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    // ---
    pub measurement: Measurement,
    pub fields: Fields,
    pub location: Location,
    pub timestamp: DateTime<Utc>,
}

impl TimeSeriesPoint {
    // ---
    fn scalar(
        measurement: Measurement,
        location: Location,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        TimeSeriesPoint {
            measurement,
            fields: Fields(vec![("value", FieldValue::Float(value))]),
            location,
            timestamp,
        }
    }

    /// `home_pressure` in hPa.
    pub fn pressure(location: Location, hpa: f64, timestamp: DateTime<Utc>) -> Self {
        Self::scalar(Measurement::Pressure, location, hpa, timestamp)
    }

    /// `home_humidity` in percent.
    pub fn humidity(location: Location, percent: f64, timestamp: DateTime<Utc>) -> Self {
        Self::scalar(Measurement::Humidity, location, percent, timestamp)
    }

    /// `home_temperature` in °C.
    pub fn temperature(location: Location, celsius: f64, timestamp: DateTime<Utc>) -> Self {
        Self::scalar(Measurement::Temperature, location, celsius, timestamp)
    }

    /// `home_uvi`, outdoor only.
    pub fn uvi(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self::scalar(Measurement::Uvi, Location::Outdoor, value, timestamp)
    }

    /// `home_rain`, outdoor only.
    pub fn rain(rain: RainClassification, timestamp: DateTime<Utc>) -> Self {
        TimeSeriesPoint {
            measurement: Measurement::Rain,
            fields: Fields(vec![
                ("value", FieldValue::Bool(rain.raining)),
                ("level", FieldValue::Int(i64::from(rain.level))),
            ]),
            location: Location::Outdoor,
            timestamp,
        }
    }

    /// `home_weather_forecast`, stamped with the forecast's own time.
    ///
    /// Fails only when `dt` lies outside the range chrono can represent.
    pub fn forecast(point: &ForecastPoint) -> anyhow::Result<Self> {
        // ---
        let timestamp = DateTime::from_timestamp(point.dt, 0)
            .ok_or_else(|| anyhow::anyhow!("forecast timestamp out of range: {}", point.dt))?;

        Ok(TimeSeriesPoint {
            measurement: Measurement::WeatherForecast,
            fields: Fields(vec![
                ("temp", FieldValue::Float(point.temp)),
                ("humidity", FieldValue::Float(point.humidity)),
                ("rain", FieldValue::Bool(point.rain.raining)),
                ("rain_level", FieldValue::Int(i64::from(point.rain.level))),
                ("pressure", FieldValue::Float(point.pressure)),
            ]),
            location: Location::Outdoor,
            timestamp,
        })
    }

    /// ISO-8601 form of the timestamp, as logged.
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// Deserialize a float from either a JSON number or a numeric string.
///
/// Sources are loosely typed: the device reader prints `"21.5"` for
/// temperature, the weather API prints integers for humidity.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    let value = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(v) => v,
        NumberOrString::String(raw) => raw.trim().parse::<f64>().map_err(|e| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&raw),
                &format!("a number or numeric string: {}", e).as_str(),
            )
        })?,
    };

    // NaN and infinities would be stored as JSON null
    if !value.is_finite() {
        return Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Float(value),
            &"a finite number",
        ));
    }

    Ok(value)
}
