//! Outdoor weather: API payloads, the OpenWeatherMap client and the
//! assembler that normalizes the three responses.
//!
//! The three calls (current conditions, UV index, forecast) are independent.
//! A call that comes back with a non-success status, or fails outright,
//! yields `None` and only that part of the [`OutdoorReport`] is missing.

use anyhow::{Context as _, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::classify::{classify, RainClassification};
use crate::models::lenient_f64;
use crate::Config;

// ---

/// One weather-condition record. Only the icon code matters here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherCondition {
    #[serde(default, deserialize_with = "icon_or_none")]
    pub icon: Option<String>,
}

/// Non-string icons are treated the same as missing ones.
fn icon_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_str().map(str::to_string))
}

/// `main` block of the current and forecast payloads, metric units.
#[derive(Debug, Clone, Deserialize)]
pub struct MainReadings {
    #[serde(deserialize_with = "lenient_f64")]
    pub temp: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub humidity: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub pressure: f64,
}

/// Response of `/weather`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeatherResponse {
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

/// Response of `/uvi`.
#[derive(Debug, Clone, Deserialize)]
pub struct UviResponse {
    #[serde(deserialize_with = "lenient_f64")]
    pub value: f64,
}

/// Response of `/forecast`.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    pub list: Vec<ForecastEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEntry {
    /// Seconds since the epoch, UTC.
    pub dt: i64,
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

/// Normalized current outdoor conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub rain: RainClassification,
}

/// One normalized forecast reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub dt: i64,
    pub temp: f64,
    pub humidity: f64,
    pub rain: RainClassification,
    pub pressure: f64,
}

/// Everything the outdoor phase persists. Absent parts were not fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutdoorReport {
    pub current: Option<WeatherSnapshot>,
    pub uvi: Option<f64>,
    pub forecast: Option<Vec<ForecastPoint>>,
}

/// Normalize the three API responses.
///
/// Forecast entries map one-to-one onto [`ForecastPoint`]s in source order.
pub fn assemble_outdoor(
    current: Option<CurrentWeatherResponse>,
    uvi: Option<UviResponse>,
    forecast: Option<ForecastResponse>,
) -> OutdoorReport {
    // ---
    let current = current.map(|c| WeatherSnapshot {
        temperature: c.main.temp,
        humidity: c.main.humidity,
        pressure: c.main.pressure,
        rain: classify(&c.weather),
    });

    let forecast = forecast.map(|f| {
        f.list
            .into_iter()
            .map(|entry| ForecastPoint {
                dt: entry.dt,
                temp: entry.main.temp,
                humidity: entry.main.humidity,
                rain: classify(&entry.weather),
                pressure: entry.main.pressure,
            })
            .collect()
    });

    OutdoorReport {
        current,
        uvi: uvi.map(|u| u.value),
        forecast,
    }
}

/// Remote source of outdoor weather.
///
/// `Ok(None)` means the call completed without a successful result.
#[allow(async_fn_in_trait)]
pub trait WeatherSource {
    async fn current(&self) -> Result<Option<CurrentWeatherResponse>>;
    async fn uvi(&self) -> Result<Option<UviResponse>>;
    async fn forecast(&self) -> Result<Option<ForecastResponse>>;
}

/// Fetch current, UV and forecast in that order, then assemble.
///
/// A sub-call that errors is logged and treated like a non-success status:
/// only its part of the report is missing.
pub async fn fetch_outdoor<W: WeatherSource>(source: &W) -> OutdoorReport {
    // ---
    let current = or_absent("current weather", source.current().await);
    let uvi = or_absent("UV index", source.uvi().await);
    let forecast = or_absent("forecast", source.forecast().await);

    assemble_outdoor(current, uvi, forecast)
}

fn or_absent<T>(what: &str, fetched: Result<Option<T>>) -> Option<T> {
    match fetched {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to fetch {}, skipping: {:#}", what, e);
            None
        }
    }
}

/// OpenWeatherMap 2.5 API client.
#[derive(Debug, Clone)]
pub struct OpenWeatherMap {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    city_id: u32,
    lat: f64,
    lon: f64,
}

impl OpenWeatherMap {
    pub fn new(cfg: &Config) -> Self {
        // ---
        OpenWeatherMap {
            client: reqwest::Client::new(),
            base_url: cfg.weather_api_url.trim_end_matches('/').to_string(),
            api_key: cfg.weather_api_key.clone(),
            city_id: cfg.weather_city_id,
            lat: cfg.weather_lat,
            lon: cfg.weather_lon,
        }
    }

    /// GET `<base>/<endpoint>` and decode the body.
    ///
    /// Non-success status codes are logged and reported as `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        // ---
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("Fetching {} with {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned {}, skipping", url, status);
            return Ok(None);
        }

        let body = response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {}", url))?;

        Ok(Some(body))
    }
}

impl WeatherSource for OpenWeatherMap {
    async fn current(&self) -> Result<Option<CurrentWeatherResponse>> {
        self.get_json(
            "weather",
            &[
                ("id", self.city_id.to_string()),
                ("units", "metric".to_string()),
            ],
        )
        .await
    }

    async fn uvi(&self) -> Result<Option<UviResponse>> {
        self.get_json(
            "uvi",
            &[("lat", self.lat.to_string()), ("lon", self.lon.to_string())],
        )
        .await
    }

    async fn forecast(&self) -> Result<Option<ForecastResponse>> {
        self.get_json(
            "forecast",
            &[
                ("id", self.city_id.to_string()),
                ("units", "metric".to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn create_test_current(icon: &str) -> CurrentWeatherResponse {
        serde_json::from_value(serde_json::json!({
            "coord": {"lon": -1.93, "lat": 43.32},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": icon}],
            "main": {"temp": 15.0, "humidity": 80, "pressure": 1013},
            "name": "Donostia"
        }))
        .unwrap()
    }

    fn create_test_forecast(entries: &[(i64, &str)]) -> ForecastResponse {
        let list: Vec<_> = entries
            .iter()
            .map(|(dt, icon)| {
                serde_json::json!({
                    "dt": dt,
                    "main": {"temp": 10.5, "humidity": 65, "pressure": 1008.2},
                    "weather": [{"icon": icon}]
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({ "cod": "200", "list": list })).unwrap()
    }

    #[test]
    fn test_current_weather_snapshot() {
        // ---
        let report = assemble_outdoor(Some(create_test_current("10d")), None, None);
        let current = report.current.unwrap();

        assert_eq!(current.temperature, 15.0);
        assert_eq!(current.humidity, 80.0);
        assert_eq!(current.pressure, 1013.0);
        assert!(current.rain.raining);
        assert_eq!(current.rain.level, 2);
    }

    #[test]
    fn test_uvi_extracted() {
        // ---
        let uvi: UviResponse =
            serde_json::from_str(r#"{"lat": 43.32, "lon": -1.93, "value": 4.87}"#).unwrap();
        let report = assemble_outdoor(None, Some(uvi), None);

        assert_eq!(report.uvi, Some(4.87));
        assert!(report.current.is_none());
        assert!(report.forecast.is_none());
    }

    #[test]
    fn test_forecast_preserves_count_and_order() {
        // ---
        let entries = [
            (1_700_010_800, "01d"),
            (1_700_000_000, "13d"),
            (1_700_000_000, "09d"),
            (1_700_021_600, "10n"),
        ];
        let report = assemble_outdoor(None, None, Some(create_test_forecast(&entries)));
        let forecast = report.forecast.unwrap();

        assert_eq!(forecast.len(), entries.len());
        let dts: Vec<i64> = forecast.iter().map(|f| f.dt).collect();
        assert_eq!(dts, vec![1_700_010_800, 1_700_000_000, 1_700_000_000, 1_700_021_600]);

        let levels: Vec<u8> = forecast.iter().map(|f| f.rain.level).collect();
        assert_eq!(levels, vec![0, 4, 1, 0]);
        assert_eq!(forecast[1].humidity, 65.0);
        assert_eq!(forecast[1].pressure, 1008.2);
    }

    #[test]
    fn test_empty_forecast() {
        // ---
        let report = assemble_outdoor(None, None, Some(create_test_forecast(&[])));
        assert_eq!(report.forecast, Some(vec![]));
    }

    #[test]
    fn test_missing_or_odd_weather_list() {
        // ---
        let current: CurrentWeatherResponse = serde_json::from_str(
            r#"{"main": {"temp": "3.5", "humidity": 90, "pressure": 990}, "weather": [{"icon": 7}, {}]}"#,
        )
        .unwrap();
        let report = assemble_outdoor(Some(current), None, None);
        let current = report.current.unwrap();
        assert_eq!(current.temperature, 3.5);
        assert_eq!(current.rain, RainClassification::default());

        let current: CurrentWeatherResponse =
            serde_json::from_str(r#"{"main": {"temp": 1, "humidity": 2, "pressure": 3}}"#).unwrap();
        assert!(current.weather.is_empty());
    }

    #[test]
    fn test_missing_main_is_an_error() {
        // ---
        let parsed = serde_json::from_str::<CurrentWeatherResponse>(r#"{"weather": []}"#);
        assert!(parsed.is_err());
    }

    /// Serves one canned HTTP response on 127.0.0.1 and returns the base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        // ---
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    fn create_test_client(base_url: String) -> OpenWeatherMap {
        OpenWeatherMap {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            base_url,
            api_key: "test-key".to_string(),
            city_id: 3110044,
            lat: 43.32,
            lon: -1.93,
        }
    }

    #[tokio::test]
    async fn test_client_non_success_status_is_absent() {
        // ---
        let base_url = serve_once("503 Service Unavailable", r#"{"cod": 503}"#).await;
        let client = create_test_client(base_url);

        let current = tokio_test::assert_ok!(client.current().await);
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn test_client_success_is_decoded() {
        // ---
        let base_url = serve_once("200 OK", r#"{"lat": 43.32, "lon": -1.93, "value": 6.1}"#).await;
        let client = create_test_client(base_url);

        let uvi = tokio_test::assert_ok!(client.uvi().await);
        assert_eq!(uvi.map(|u| u.value), Some(6.1));
    }

    #[tokio::test]
    async fn test_client_undecodable_body_is_an_error() {
        // ---
        let base_url = serve_once("200 OK", r#"{"list": "nope"}"#).await;
        let client = create_test_client(base_url);

        tokio_test::assert_err!(client.forecast().await);
    }

    struct FlakySource;

    impl WeatherSource for FlakySource {
        async fn current(&self) -> Result<Option<CurrentWeatherResponse>> {
            Ok(Some(create_test_current("09d")))
        }

        async fn uvi(&self) -> Result<Option<UviResponse>> {
            anyhow::bail!("connection reset by peer")
        }

        async fn forecast(&self) -> Result<Option<ForecastResponse>> {
            Ok(Some(create_test_forecast(&[(1_700_000_000, "10d")])))
        }
    }

    #[tokio::test]
    async fn test_fetch_outdoor_keeps_parts_that_succeeded() {
        // ---
        let report = fetch_outdoor(&FlakySource).await;

        assert_eq!(report.current.map(|c| c.rain.level), Some(1));
        assert!(report.uvi.is_none());
        assert_eq!(report.forecast.map(|f| f.len()), Some(1));
    }
}
