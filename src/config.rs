use std::env;

/// Wildcard subscription covering every `arpa/<measurement>/<location>` topic.
pub const MQTT_TOPIC: &str = "arpa/+/+";

const DEFAULT_MQTT_HOST: &str = "localhost";
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTT_USERNAME: &str = "sensor-node";
const DEFAULT_MQTT_PASSWORD: &str = "sensor-node";
const DEFAULT_MQTT_CLIENT_ID: &str = "mqtt-influxdb-bridge";

const DEFAULT_INFLUXDB_HOST: &str = "localhost";
const DEFAULT_INFLUXDB_PORT: u16 = 8086;
const DEFAULT_INFLUXDB_USERNAME: &str = "sensornode";
const DEFAULT_INFLUXDB_PASSWORD: &str = "sensornode";
const DEFAULT_INFLUXDB_DATABASE: &str = "sensornode";

/// Connection settings for the broker and the store.
///
/// Every value has a compiled-in default and can be overridden from the
/// environment (a `.env` file is honored via `dotenv`).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub mqtt_client_id: String,

    pub influxdb_host: String,
    pub influxdb_port: u16,
    pub influxdb_username: String,
    pub influxdb_password: String,
    pub influxdb_database: String,
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self {
            mqtt_host: env_or("MQTT_HOST", DEFAULT_MQTT_HOST),
            mqtt_port: env_port_or("MQTT_PORT", DEFAULT_MQTT_PORT),
            mqtt_username: env_or("MQTT_USERNAME", DEFAULT_MQTT_USERNAME),
            mqtt_password: env_or("MQTT_PASSWORD", DEFAULT_MQTT_PASSWORD),
            mqtt_client_id: env_or("MQTT_CLIENT_ID", DEFAULT_MQTT_CLIENT_ID),

            influxdb_host: env_or("INFLUXDB_HOST", DEFAULT_INFLUXDB_HOST),
            influxdb_port: env_port_or("INFLUXDB_PORT", DEFAULT_INFLUXDB_PORT),
            influxdb_username: env_or("INFLUXDB_USERNAME", DEFAULT_INFLUXDB_USERNAME),
            influxdb_password: env_or("INFLUXDB_PASSWORD", DEFAULT_INFLUXDB_PASSWORD),
            influxdb_database: env_or("INFLUXDB_DATABASE", DEFAULT_INFLUXDB_DATABASE),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_port_or(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a port number, got {raw:?}")),
        Err(_) => default,
    }
}
