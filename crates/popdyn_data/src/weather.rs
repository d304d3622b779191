//! Open-Meteo hourly weather client (the Peru weather dashboard page).

use crate::{check_status, DataError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";

/// How many days of history to ask for on top of the forecast, matching
/// the page's `past_days=3`.
pub const PAST_DAYS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

/// The ten Peruvian cities the page offers.
pub const PERU_CITIES: &[City] = &[
    City { name: "Lima", latitude: -12.0464, longitude: -77.0428 },
    City { name: "Arequipa", latitude: -16.4090, longitude: -71.5375 },
    City { name: "Cusco", latitude: -13.5319, longitude: -71.9675 },
    City { name: "Trujillo", latitude: -8.1117, longitude: -79.0288 },
    City { name: "Piura", latitude: -5.1945, longitude: -80.6328 },
    City { name: "Chiclayo", latitude: -6.7714, longitude: -79.8409 },
    City { name: "Huancayo", latitude: -12.0651, longitude: -75.2049 },
    City { name: "Iquitos", latitude: -3.7491, longitude: -73.2538 },
    City { name: "Tacna", latitude: -18.0066, longitude: -70.2463 },
    City { name: "Puno", latitude: -15.8402, longitude: -70.0219 },
];

pub fn city_by_name(name: &str) -> Option<&'static City> {
    PERU_CITIES.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HourlyVariable {
    Temperature,
    RelativeHumidity,
    WindSpeed,
}

impl HourlyVariable {
    /// The API field name.
    pub fn api_name(&self) -> &'static str {
        match self {
            HourlyVariable::Temperature => "temperature_2m",
            HourlyVariable::RelativeHumidity => "relativehumidity_2m",
            HourlyVariable::WindSpeed => "windspeed_10m",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HourlyVariable::Temperature => "Temperature (°C)",
            HourlyVariable::RelativeHumidity => "Relative humidity (%)",
            HourlyVariable::WindSpeed => "Wind speed (km/h)",
        }
    }

    pub const ALL: [HourlyVariable; 3] = [
        HourlyVariable::Temperature,
        HourlyVariable::RelativeHumidity,
        HourlyVariable::WindSpeed,
    ];
}

/// One hourly observation or forecast point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub time: NaiveDateTime,
    pub value: f64,
}

/// Caller-side window trimming: keep only the last `n` samples, like the
/// page's "last 24/48/72 hours" dropdown. `None` keeps everything.
pub fn last_hours(samples: &[HourlySample], n: Option<usize>) -> &[HourlySample] {
    match n {
        Some(n) if samples.len() > n => &samples[samples.len() - n..],
        _ => samples,
    }
}

#[derive(Debug, Deserialize)]
struct ForecastPayload {
    #[serde(default)]
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relativehumidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m: Vec<Option<f64>>,
}

impl HourlyBlock {
    fn values(&self, variable: HourlyVariable) -> &[Option<f64>] {
        match variable {
            HourlyVariable::Temperature => &self.temperature_2m,
            HourlyVariable::RelativeHumidity => &self.relativehumidity_2m,
            HourlyVariable::WindSpeed => &self.windspeed_10m,
        }
    }
}

pub struct WeatherClient {
    base_url: String,
    client: reqwest::Client,
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Fetches the hourly series for one variable at one city. Null values
    /// in the payload are dropped so the caller only ever sees numbers;
    /// no data at all comes back as an empty vector.
    pub async fn hourly(
        &self,
        city: &City,
        variable: HourlyVariable,
    ) -> Result<Vec<HourlySample>, DataError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let hourly: Vec<&str> = HourlyVariable::ALL.iter().map(|v| v.api_name()).collect();
        tracing::debug!(city = city.name, variable = variable.api_name(), "fetching weather");

        let response = check_status(
            self.client
                .get(&url)
                .query(&[
                    ("latitude", city.latitude.to_string()),
                    ("longitude", city.longitude.to_string()),
                    ("hourly", hourly.join(",")),
                    ("timezone", "auto".to_string()),
                    ("past_days", PAST_DAYS.to_string()),
                ])
                .send()
                .await?,
        )
        .await?;

        let payload: ForecastPayload = response.json().await?;
        let Some(block) = payload.hourly else {
            return Ok(Vec::new());
        };

        let samples = block
            .time
            .iter()
            .zip(block.values(variable))
            .filter_map(|(time, value)| {
                let time = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M").ok()?;
                Some(HourlySample {
                    time,
                    value: (*value)?,
                })
            })
            .collect();
        Ok(samples)
    }
}
