//! The forecast API tier.

use crate::config::ForecastConfig;
use crate::types::feature::{Feature, PartialFeatures};
use crate::types::station::LatLon;
use crate::weather_data::error::WeatherDataError;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

/// Requested parameters and the slot each one fills.
pub const PARAMETERS: [(&str, Feature); Feature::COUNT] = [
    ("t_2m:C", Feature::DryBulbTemperature),
    ("wind_speed_10m:kmh", Feature::WindSpeed),
    ("wind_dir_10m:d", Feature::WindDirection),
    ("dew_point_2m:C", Feature::DewPointTemperature),
    ("relative_humidity_2m:p", Feature::RelativeHumidity),
    ("visibility:nmi", Feature::Visibility),
    ("msl_pressure:hPa", Feature::StationPressure),
    ("wet_bulb_t_2m:C", Feature::WetBulbTemperature),
];

const VISIBILITY_CAP_MILES: f64 = 10.0;

pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa * 0.02953
}

/// Nautical miles to statute miles, capped at 10.
pub fn nmi_to_miles(nmi: f64) -> f64 {
    (nmi * 1.15078).min(VISIBILITY_CAP_MILES)
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    data: Vec<ParameterSeries>,
}

#[derive(Debug, Deserialize)]
struct ParameterSeries {
    parameter: String,
    #[serde(default)]
    coordinates: Vec<CoordinateSeries>,
}

#[derive(Debug, Deserialize)]
struct CoordinateSeries {
    #[serde(default)]
    dates: Vec<DatedValue>,
}

#[derive(Debug, Deserialize)]
struct DatedValue {
    value: Option<f64>,
}

impl ForecastResponse {
    fn into_features(self) -> PartialFeatures {
        let mut features = PartialFeatures::empty();
        for series in self.data {
            let Some((_, feature)) = PARAMETERS.iter().find(|(p, _)| *p == series.parameter) else {
                debug!("Ignoring unrequested parameter {}", series.parameter);
                continue;
            };
            let value = series
                .coordinates
                .first()
                .and_then(|c| c.dates.first())
                .and_then(|d| d.value)
                .map(|v| match feature {
                    Feature::StationPressure => hpa_to_inhg(v),
                    Feature::Visibility => nmi_to_miles(v),
                    _ => v,
                });
            if value.is_some() {
                features.set(*feature, value);
            }
        }
        features
    }
}

/// Single-point forecast client.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    config: ForecastConfig,
    client: Client,
}

impl ForecastClient {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn url(&self, instant: DateTime<Utc>, point: LatLon) -> String {
        let parameters: Vec<&str> = PARAMETERS.iter().map(|(p, _)| *p).collect();
        format!(
            "{}/{}/{}/{},{}/json?source={}",
            self.config.base_url.trim_end_matches('/'),
            instant.format("%Y-%m-%dT%H:%M:%SZ"),
            parameters.join(","),
            point.0,
            point.1,
            self.config.model
        )
    }

    /// Fetches the forecast at `point` for `instant`.
    ///
    /// Parameters the response leaves out or reports as null stay absent.
    pub async fn fetch(
        &self,
        instant: DateTime<Utc>,
        point: LatLon,
    ) -> Result<PartialFeatures, WeatherDataError> {
        let url = self.url(instant, point);
        let credentials = &self.config.credentials;

        let response = self
            .client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| WeatherDataError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Forecast request failed: {:?}", e.status());
                return Err(if let Some(status) = e.status() {
                    WeatherDataError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    WeatherDataError::NetworkRequest(url, e)
                });
            }
        };

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| WeatherDataError::ResponseDecode(url, e))?;
        Ok(body.into_features())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiCredentials;
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{basic_auth, method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> ForecastClient {
        ForecastClient::new(
            ForecastConfig::builder()
                .credentials(ApiCredentials::new("user", "pass"))
                .base_url(base_url)
                .timeout(Duration::from_millis(500))
                .build(),
        )
    }

    fn series(parameter: &str, value: serde_json::Value) -> serde_json::Value {
        json!({
            "parameter": parameter,
            "coordinates": [{ "lat": 30.19, "lon": -97.67, "dates": [{ "date": "2024-01-15T18:00:00Z", "value": value }] }]
        })
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_unit_conversions() {
        assert!((hpa_to_inhg(1013.25) - 29.92).abs() < 0.01);
        assert_eq!(nmi_to_miles(8.69), 10.0);
        assert_eq!(nmi_to_miles(50.0), 10.0);
        assert!((nmi_to_miles(5.0) - 5.7539).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_null_parameter_keeps_earlier_value() -> Result<(), serde_json::Error> {
        let response: ForecastResponse = serde_json::from_value(json!({
            "data": [
                series("t_2m:C", json!(12.5)),
                series("t_2m:C", json!(null)),
            ]
        }))?;
        let features = response.into_features();
        assert_eq!(features.get(Feature::DryBulbTemperature), Some(12.5));
        assert_eq!(features.present_count(), 1);
        Ok(())
    }

    #[test]
    fn test_url_layout() {
        let url = client("https://api.example.com/".into()).url(instant(), LatLon(30.1945, -97.6699));
        assert!(url.starts_with("https://api.example.com/2024-01-15T18:00:00Z/t_2m:C,wind_speed_10m:kmh,"));
        assert!(url.ends_with("/30.1945,-97.6699/json?source=ecmwf-ifs"));
    }

    #[tokio::test]
    async fn test_fetch_converts_all_parameters() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        let body = json!({
            "version": "3.0",
            "status": "OK",
            "data": [
                series("t_2m:C", json!(12.5)),
                series("wind_speed_10m:kmh", json!(18.0)),
                series("wind_dir_10m:d", json!(200.0)),
                series("dew_point_2m:C", json!(4.1)),
                series("relative_humidity_2m:p", json!(57.0)),
                series("visibility:nmi", json!(20.0)),
                series("msl_pressure:hPa", json!(1013.25)),
                series("wet_bulb_t_2m:C", json!(8.3)),
            ]
        });
        Mock::given(method("GET"))
            .and(path_regex(r"^/2024-01-15T18:00:00Z/t_2m:C,.+/30\.1945,-97\.6699/json$"))
            .and(query_param("source", "ecmwf-ifs"))
            .and(basic_auth("user", "pass"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let features = client(mock_server.uri())
            .fetch(instant(), LatLon(30.1945, -97.6699))
            .await?;

        assert!(features.is_complete());
        assert_eq!(features.get(Feature::DryBulbTemperature), Some(12.5));
        assert_eq!(features.get(Feature::Visibility), Some(10.0));
        let pressure = features.get(Feature::StationPressure).unwrap();
        assert!((pressure - 29.92).abs() < 0.01);
        Ok(())
    }

    #[tokio::test]
    async fn test_null_and_missing_parameters_stay_absent() -> Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;
        let body = json!({
            "data": [
                series("t_2m:C", json!(12.5)),
                series("wind_speed_10m:kmh", json!(null)),
                { "parameter": "dew_point_2m:C", "coordinates": [] },
            ]
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let features = client(mock_server.uri())
            .fetch(instant(), LatLon(30.0, -97.0))
            .await?;
        assert_eq!(features.present_count(), 1);
        assert_eq!(features.get(Feature::WindSpeed), None);
        assert_eq!(features.get(Feature::DewPointTemperature), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result = client(mock_server.uri())
            .fetch(instant(), LatLon(30.0, -97.0))
            .await;
        assert!(matches!(
            result,
            Err(WeatherDataError::HttpStatus { status, .. }) if status.as_u16() == 401
        ));
    }

    #[tokio::test]
    async fn test_slow_api_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let result = client(mock_server.uri())
            .fetch(instant(), LatLon(30.0, -97.0))
            .await;
        assert!(matches!(result, Err(WeatherDataError::NetworkRequest(..))));
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let result = client(mock_server.uri())
            .fetch(instant(), LatLon(30.0, -97.0))
            .await;
        assert!(matches!(result, Err(WeatherDataError::ResponseDecode(..))));
    }
}
