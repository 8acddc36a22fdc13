//! Indoor readings: barometric pressure from a local sensor plus temperature
//! and humidity from a Bluetooth thermo-hygrometer.
//!
//! The thermo-hygrometer is read by an external program which prints a JSON
//! object such as `{"temperature":"21.5","humidity":48}` on stdout.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context as _, Result};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::models::lenient_f64;
use crate::Config;

// ---

/// Source of the indoor barometric pressure, in hPa.
pub trait PressureSensor {
    fn read_pressure(&self) -> Result<f64>;
}

/// Reads the thermo-hygrometer and returns its raw JSON output.
#[allow(async_fn_in_trait)]
pub trait DeviceReader {
    async fn read(&self) -> Result<String>;
}

/// Pressure sensor exposed through Linux IIO sysfs.
///
/// `in_pressure_input` holds kPa; the reading is returned in hPa.
#[derive(Debug, Clone)]
pub struct IioPressureSensor {
    path: PathBuf,
}

impl IioPressureSensor {
    pub fn new(cfg: &Config) -> Self {
        IioPressureSensor {
            path: cfg.pressure_sensor_path.clone(),
        }
    }
}

impl PressureSensor for IioPressureSensor {
    fn read_pressure(&self) -> Result<f64> {
        // ---
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read pressure sensor {:?}", self.path))?;
        let kpa = parse_kpa(&raw)
            .with_context(|| format!("invalid pressure reading in {:?}", self.path))?;

        Ok(kpa * 10.0)
    }
}

fn parse_kpa(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let kpa = trimmed
        .parse::<f64>()
        .map_err(|e| anyhow!("{:?} is not a number: {}", trimmed, e))?;
    if !kpa.is_finite() {
        bail!("{:?} is not a finite number", trimmed);
    }
    Ok(kpa)
}

/// Runs `<program> <address>` and returns its trimmed stdout.
#[derive(Debug, Clone)]
pub struct ProcessDeviceReader {
    program: PathBuf,
    address: String,
}

impl ProcessDeviceReader {
    pub fn new(cfg: &Config) -> Self {
        ProcessDeviceReader {
            program: cfg.device_reader.clone(),
            address: cfg.device_address.clone(),
        }
    }
}

impl DeviceReader for ProcessDeviceReader {
    async fn read(&self) -> Result<String> {
        // ---
        debug!("Running {:?} {}", self.program, self.address);

        let output = Command::new(&self.program)
            .arg(&self.address)
            .output()
            .await
            .with_context(|| format!("failed to run device reader {:?}", self.program))?;

        if !output.status.success() {
            bail!(
                "device reader {:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8(output.stdout)
            .context("device reader output is not valid UTF-8")?;
        let stdout = stdout.trim();
        if stdout.is_empty() {
            bail!("device reader returned nothing for {}", self.address);
        }

        Ok(stdout.to_string())
    }
}

/// Payload printed by the device reader.
#[derive(Debug, Deserialize)]
struct DeviceReading {
    #[serde(deserialize_with = "lenient_f64")]
    temperature: f64,
    #[serde(deserialize_with = "lenient_f64")]
    humidity: f64,
}

/// Normalized indoor readings.
#[derive(Debug, Clone, PartialEq)]
pub struct IndoorSnapshot {
    pub pressure: f64,
    pub temperature: f64,
    pub humidity: f64,
}

/// Combine a pressure reading with the device reader's JSON output.
///
/// Missing `temperature` or `humidity` is an error.
pub fn assemble_indoor(pressure: f64, device_json: &str) -> Result<IndoorSnapshot> {
    // ---
    let reading: DeviceReading = serde_json::from_str(device_json.trim())
        .with_context(|| format!("malformed device reader output: {:?}", device_json))?;

    Ok(IndoorSnapshot {
        pressure,
        temperature: reading.temperature,
        humidity: reading.humidity,
    })
}

/// Read both indoor sources and assemble.
pub async fn collect_indoor<P, D>(sensor: &P, reader: &D) -> Result<IndoorSnapshot>
where
    P: PressureSensor,
    D: DeviceReader,
{
    // ---
    let pressure = sensor
        .read_pressure()
        .context("failed to read indoor pressure")?;
    let device_json = reader
        .read()
        .await
        .context("failed to read thermo-hygrometer")?;

    assemble_indoor(pressure, &device_json)
}
