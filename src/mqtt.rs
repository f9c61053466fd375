//! MQTT publish transport.
//!
//! Wraps a rumqttc client plus the event-loop driver task. Reconnection is
//! owned by the event loop: each successful (re)connect surfaces as a
//! ConnAck, which is where the connection counter is bumped and the topic
//! subscription refreshed.

use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::envelope::PacketEnvelope;

/// Capacity of the request channel between client and event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;
/// Pause after a connection error before polling the event loop again.
const RECONNECT_PAUSE: Duration = Duration::from_secs(5);

/// Publisher for packet envelopes.
pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
}

impl MqttPublisher {
    /// Create the client and spawn the event-loop driver task.
    ///
    /// The connection itself is established (and re-established) by the
    /// driver; publishes enqueued before the first ConnAck are flushed once
    /// the session is up.
    pub fn start(config: &MqttConfig) -> (Self, JoinHandle<()>) {
        info!(
            "Starting MQTT client for {}:{} (topic {})",
            config.broker, config.port, config.topic
        );

        let mut options = MqttOptions::new("packetbridge", config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let driver = tokio::spawn(drive_connection(
            event_loop,
            client.clone(),
            config.topic.clone(),
        ));

        (
            Self {
                client,
                topic: config.topic.clone(),
            },
            driver,
        )
    }

    /// Publish one envelope as JSON at QoS 1.
    pub async fn publish(&self, envelope: &PacketEnvelope) -> Result<()> {
        let payload = serde_json::to_vec(envelope).context("Failed to serialize envelope")?;

        let start = std::time::Instant::now();
        self.client
            .publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload)
            .await
            .context("Failed to hand envelope to MQTT client")?;
        metrics::histogram!("mqtt_publish_duration_ms")
            .record(start.elapsed().as_millis() as f64);

        Ok(())
    }
}

/// Drive the MQTT event loop: connection lifecycle, acks, reconnects.
async fn drive_connection(mut event_loop: EventLoop, client: AsyncClient, topic: String) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
                metrics::counter!("mqtt_connection_count").increment(1);
                metrics::gauge!("mqtt_connected").set(1.0);

                // Refresh the subscription on every (re)connect; a new
                // session does not remember the old one.
                if let Err(e) = client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
                    warn!("Failed to subscribe to {}: {}", topic, e);
                }
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                debug!("Broker acknowledged message {}", ack.pkid);
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                debug!("Published message {}", pkid);
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                metrics::gauge!("mqtt_connected").set(0.0);
                tokio::time::sleep(RECONNECT_PAUSE).await;
            }
        }
    }
}
