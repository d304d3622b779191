//! disease.sh COVID-19 statistics client (the Covid-19 dashboard page).

use crate::{check_status, DataError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://disease.sh";

/// How much history to request; maps to the API's `lastdays` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    Days(u32),
    All,
}

impl HistoryWindow {
    fn query_value(&self) -> String {
        match self {
            HistoryWindow::Days(n) => n.to_string(),
            HistoryWindow::All => "all".to_string(),
        }
    }
}

/// Country totals from `/v3/covid-19/countries/{country}`.
///
/// The API nulls fields it has stopped tracking (notably `recovered`), so
/// everything defaults to zero, as the page did with `.get(field, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountrySnapshot {
    #[serde(default)]
    pub cases: u64,
    #[serde(default, rename = "todayCases")]
    pub today_cases: u64,
    #[serde(default)]
    pub deaths: u64,
    #[serde(default, deserialize_with = "null_to_zero")]
    pub recovered: u64,
}

fn null_to_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<u64>::deserialize(deserializer)?;
    Ok(value.unwrap_or(0))
}

/// One point of a cumulative series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedCount {
    pub date: NaiveDate,
    pub value: u64,
}

/// Parsed historical timelines, sorted by date ascending. Either series may
/// be empty when the upstream has no data for the window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountryHistory {
    pub cases: Vec<DatedCount>,
    pub deaths: Vec<DatedCount>,
}

pub struct CovidClient {
    base_url: String,
    client: reqwest::Client,
}

impl Default for CovidClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CovidClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Points the client at a different host; used by the tests to talk to
    /// a local mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Current totals for one country.
    pub async fn country_snapshot(&self, country: &str) -> Result<CountrySnapshot, DataError> {
        let url = format!("{}/v3/covid-19/countries/{country}", self.base_url);
        tracing::debug!(%url, "fetching country snapshot");
        let response = check_status(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Cumulative case/death timelines for one country.
    pub async fn historical(
        &self,
        country: &str,
        window: HistoryWindow,
    ) -> Result<CountryHistory, DataError> {
        let url = format!("{}/v3/covid-19/historical/{country}", self.base_url);
        tracing::debug!(%url, lastdays = %window.query_value(), "fetching history");
        let response = check_status(
            self.client
                .get(&url)
                .query(&[("lastdays", window.query_value())])
                .send()
                .await?,
        )
        .await?;
        let payload: Value = response.json().await?;
        parse_history(&payload)
    }
}

/// The historical endpoint returns either `{ "timeline": {...} }` or, for
/// some queries, a list of such objects; the page took the first entry.
fn parse_history(payload: &Value) -> Result<CountryHistory, DataError> {
    let container = match payload {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Ok(CountryHistory::default()),
        },
        other => other,
    };

    let timeline = match container.get("timeline") {
        Some(t @ Value::Object(_)) => t,
        Some(_) => {
            return Err(DataError::UnexpectedPayload(
                "timeline is not an object".to_string(),
            ))
        }
        None => return Ok(CountryHistory::default()),
    };

    Ok(CountryHistory {
        cases: parse_series(timeline.get("cases")),
        deaths: parse_series(timeline.get("deaths")),
    })
}

/// Timeline maps are keyed "m/d/yy". Entries with unparseable keys are
/// dropped rather than failing the whole series.
fn parse_series(series: Option<&Value>) -> Vec<DatedCount> {
    let Some(Value::Object(map)) = series else {
        return Vec::new();
    };

    let mut points: Vec<DatedCount> = map
        .iter()
        .filter_map(|(key, value)| {
            let date = NaiveDate::parse_from_str(key, "%m/%d/%y").ok()?;
            Some(DatedCount {
                date,
                value: value.as_u64().unwrap_or(0),
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn snapshot_parses_country_totals() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v3/covid-19/countries/Peru");
            then.status(200).json_body(json!({
                "country": "Peru",
                "cases": 4526977,
                "todayCases": 0,
                "deaths": 220975,
                "recovered": null
            }));
        });

        let client = CovidClient::with_base_url(server.base_url());
        let snapshot = client.country_snapshot("Peru").await.unwrap();

        mock.assert();
        assert_eq!(snapshot.cases, 4_526_977);
        assert_eq!(snapshot.deaths, 220_975);
        assert_eq!(snapshot.recovered, 0);
    }

    #[tokio::test]
    async fn historical_sorts_timeline_by_date() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/v3/covid-19/historical/Mexico")
                .query_param("lastdays", "30");
            then.status(200).json_body(json!({
                "country": "Mexico",
                "timeline": {
                    "cases": { "1/2/23": 110, "12/31/22": 100, "1/1/23": 105 },
                    "deaths": { "1/2/23": 7, "12/31/22": 5, "1/1/23": 6 }
                }
            }));
        });

        let client = CovidClient::with_base_url(server.base_url());
        let history = client
            .historical("Mexico", HistoryWindow::Days(30))
            .await
            .unwrap();

        let dates: Vec<String> = history
            .cases
            .iter()
            .map(|p| p.date.format("%Y-%m-%d").to_string())
            .collect();
        assert_eq!(dates, ["2022-12-31", "2023-01-01", "2023-01-02"]);
        assert_eq!(history.cases[0].value, 100);
        assert_eq!(history.deaths[2].value, 7);
    }

    #[tokio::test]
    async fn historical_accepts_list_payload_and_all_window() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/v3/covid-19/historical/USA")
                .query_param("lastdays", "all");
            then.status(200).json_body(json!([{
                "country": "USA",
                "timeline": { "cases": { "3/1/20": 30 }, "deaths": { "3/1/20": 1 } }
            }]));
        });

        let client = CovidClient::with_base_url(server.base_url());
        let history = client.historical("USA", HistoryWindow::All).await.unwrap();
        assert_eq!(history.cases.len(), 1);
        assert_eq!(history.cases[0].value, 30);
    }

    #[tokio::test]
    async fn missing_timeline_yields_empty_series() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/covid-19/historical/Nowhere");
            then.status(200).json_body(json!({ "country": "Nowhere" }));
        });

        let client = CovidClient::with_base_url(server.base_url());
        let history = client
            .historical("Nowhere", HistoryWindow::Days(30))
            .await
            .unwrap();
        assert!(history.cases.is_empty());
        assert!(history.deaths.is_empty());
    }

    #[tokio::test]
    async fn upstream_error_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v3/covid-19/countries/Atlantis");
            then.status(404).json_body(json!({ "message": "not found" }));
        });

        let client = CovidClient::with_base_url(server.base_url());
        let err = client.country_snapshot("Atlantis").await.unwrap_err();
        match err {
            DataError::UpstreamStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("expected UpstreamStatus, got {other:?}"),
        }
    }
}
