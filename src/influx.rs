use log::{debug, info};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;

use crate::config::BridgeConfig;
use crate::telemetry::SensorReading;

/// Errors surfaced by the store.
#[derive(Debug)]
pub enum StoreError {
    /// The HTTP request itself failed (connection refused, timeout, ...).
    Http(reqwest::Error),
    /// The response body was not the JSON we expect from InfluxDB.
    Json(serde_json::Error),
    /// InfluxDB answered with a non-success status.
    Rejected { status: StatusCode, body: String },
    /// InfluxDB answered 200 but reported a statement-level error.
    Server(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Http(e) => write!(f, "HTTP request failed: {}", e),
            StoreError::Json(e) => write!(f, "unexpected InfluxDB response: {}", e),
            StoreError::Rejected { status, body } => {
                write!(f, "InfluxDB rejected request ({}): {}", status, body)
            }
            StoreError::Server(message) => write!(f, "InfluxDB error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Http(e) => Some(e),
            StoreError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Http(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

/// Response shape of the InfluxDB 1.x `/query` endpoint.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Long-lived handle to one InfluxDB database.
///
/// Created once at startup and reused for every write; the database named
/// in the config is the write target for the life of the process.
pub struct InfluxClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    database: String,
}

impl InfluxClient {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{}:{}", config.influxdb_host, config.influxdb_port),
            username: config.influxdb_username.clone(),
            password: config.influxdb_password.clone(),
            database: config.influxdb_database.clone(),
        }
    }

    /// Create the target database if it does not exist yet.
    ///
    /// Safe to call when it already does; one call at startup is enough.
    pub async fn ensure_database(&self) -> Result<(), StoreError> {
        let databases = self.list_databases().await?;
        if !databases.iter().any(|name| name == &self.database) {
            info!("creating InfluxDB database {:?}", self.database);
            self.query(&format!("CREATE DATABASE \"{}\"", self.database))
                .await?;
        }
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<String>, StoreError> {
        let response = self.query("SHOW DATABASES").await?;
        Ok(database_names(response))
    }

    /// Write one reading as a single point, letting the server assign the
    /// timestamp.
    pub async fn write(&self, reading: &SensorReading) -> Result<(), StoreError> {
        let line = line_protocol(reading);
        debug!("writing point: {}", line);
        let response = self
            .http
            .post(format!("{}/write", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("db", self.database.as_str())])
            .body(line)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, body });
        }
        Ok(())
    }

    async fn query(&self, statement: &str) -> Result<QueryResponse, StoreError> {
        let response = self
            .http
            .post(format!("{}/query", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("q", statement)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Rejected { status, body });
        }
        let parsed: QueryResponse = serde_json::from_str(&body)?;
        if let Some(message) = parsed.results.iter().find_map(|r| r.error.clone()) {
            return Err(StoreError::Server(message));
        }
        Ok(parsed)
    }
}

fn database_names(response: QueryResponse) -> Vec<String> {
    response
        .results
        .into_iter()
        .flat_map(|result| result.series)
        .flat_map(|series| series.values)
        .filter_map(|row| row.into_iter().next())
        .collect()
}

/// Render one reading in InfluxDB Line Protocol, without a timestamp:
///
/// ```text
/// <measurement>,location=<location> value=<value>
/// ```
fn line_protocol(reading: &SensorReading) -> String {
    format!(
        "{},location={} value={}",
        escape_measurement(&reading.measurement),
        escape_tag(&reading.location),
        reading.value
    )
}

/// Commas and spaces in a measurement name must be backslash-escaped.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Commas, equals signs and spaces in a tag value must be backslash-escaped.
fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(measurement: &str, location: &str, value: f64) -> SensorReading {
        SensorReading {
            location: location.to_string(),
            measurement: measurement.to_string(),
            value,
        }
    }

    #[test]
    fn test_line_protocol_simple_point() {
        let line = line_protocol(&reading("temperature", "3", 22.05));
        assert_eq!(line, "temperature,location=3 value=22.05");
    }

    #[test]
    fn test_line_protocol_integral_value() {
        let line = line_protocol(&reading("gas", "7", 1.0));
        assert_eq!(line, "gas,location=7 value=1");
    }

    #[test]
    fn test_line_protocol_escapes_special_chars() {
        let line = line_protocol(&reading("my measurement", "a,b=c", 0.5));
        assert_eq!(line, "my\\ measurement,location=a\\,b\\=c value=0.5");
    }

    #[test]
    fn test_database_names() {
        let body = r#"{"results":[{"statement_id":0,"series":[{"name":"databases","columns":["name"],"values":[["_internal"],["sensornode"]]}]}]}"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(database_names(response), vec!["_internal", "sensornode"]);
    }

    #[test]
    fn test_database_names_empty_server() {
        // A fresh server answers with a series that has no values.
        let body = r#"{"results":[{"statement_id":0,"series":[{"name":"databases","columns":["name"]}]}]}"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        assert!(database_names(response).is_empty());
    }

    #[test]
    fn test_statement_error_is_parsed() {
        let body = r#"{"results":[{"statement_id":0,"error":"authorization failed"}]}"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            response.results[0].error.as_deref(),
            Some("authorization failed")
        );
    }
}
