use log::{debug, error, info, trace, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

use crate::config::{self, BridgeConfig};
use crate::influx::InfluxClient;
use crate::telemetry;

/// Run the bridge until the process is killed.
///
/// Returns only on startup failure: an unreachable store, or an event-loop
/// error before the first CONNACK. Once connected, transport errors are
/// logged and the loop keeps polling so rumqttc can reconnect on its own;
/// the subscription is re-issued on every CONNACK.
pub async fn run(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = InfluxClient::new(&config);
    store.ensure_database().await?;

    let mut options = MqttOptions::new(
        config.mqtt_client_id.clone(),
        config.mqtt_host.clone(),
        config.mqtt_port,
    );
    options.set_credentials(config.mqtt_username.clone(), config.mqtt_password.clone());

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    let mut connected = false;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connected = true;
                info!(
                    "connected to MQTT broker at {}:{} ({:?})",
                    config.mqtt_host, config.mqtt_port, ack.code
                );
                client.subscribe(config::MQTT_TOPIC, QoS::AtMostOnce).await?;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_message(&store, &publish.topic, &publish.payload).await;
            }
            Ok(_) => {}
            Err(e) if !connected => return Err(e.into()),
            Err(e) => {
                error!("MQTT connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Process one inbound message. Never fails: every per-message problem is
/// logged and the message dropped, so the subscription stays alive.
async fn handle_message(store: &InfluxClient, topic: &str, payload: &[u8]) {
    debug!("{} {:?}", topic, String::from_utf8_lossy(payload));
    match telemetry::decode(topic, payload) {
        Ok(Some(reading)) => {
            if let Err(e) = store.write(&reading).await {
                error!("dropping reading from {}: {}", topic, e);
            }
        }
        Ok(None) => trace!("ignoring {}", topic),
        Err(e) => warn!("{}", e),
    }
}
