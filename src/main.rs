use dotenv::dotenv;
use log::info;

use config::BridgeConfig;

mod bridge;
mod config;
mod influx;
mod telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("MQTT to InfluxDB bridge");
    let config = BridgeConfig::from_env();
    bridge::run(config).await
}
