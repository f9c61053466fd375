use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use packetbridge::bridge::Bridge;
use packetbridge::config::BridgeConfig;
use packetbridge::mqtt::MqttPublisher;
use packetbridge::queue::FrameQueue;
use packetbridge::tnc_client::TncClient;

#[derive(Parser, Debug)]
#[command(
    name = "packetbridge",
    version,
    about = "Bridge a KISS TNC to MQTT, republishing decoded AX.25 frames as JSON."
)]
struct Args {
    /// MQTT broker host (overrides MQTT_BROKER)
    #[arg(long)]
    mqtt_broker: Option<String>,
    /// MQTT broker port (overrides MQTT_PORT)
    #[arg(long)]
    mqtt_port: Option<u16>,
    /// MQTT topic (overrides MQTT_TOPIC)
    #[arg(long)]
    mqtt_topic: Option<String>,
    /// KISS TNC host (overrides KISS_TNC_HOST)
    #[arg(long)]
    tnc_host: Option<String>,
    /// KISS TNC port (overrides KISS_TNC_PORT)
    #[arg(long)]
    tnc_port: Option<u16>,
    /// Metrics port (overrides METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,
}

impl Args {
    fn apply(self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(broker) = self.mqtt_broker {
            config.mqtt.broker = broker;
        }
        if let Some(port) = self.mqtt_port {
            config.mqtt.port = port;
        }
        if let Some(topic) = self.mqtt_topic {
            config.mqtt.topic = topic;
        }
        if let Some(host) = self.tnc_host {
            config.tnc.host = host;
        }
        if let Some(port) = self.tnc_port {
            config.tnc.port = port;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.apply(BridgeConfig::from_env());
    info!(
        "Bridging KISS TNC {}:{} to MQTT {}:{} (topic {})",
        config.tnc.host, config.tnc.port, config.mqtt.broker, config.mqtt.port, config.mqtt.topic
    );

    // Counters must exist before the first scrape, so the recorder is
    // installed and zeroed before the server starts.
    packetbridge::metrics::install_recorder();
    packetbridge::metrics::initialize_bridge_metrics();
    let metrics_server = tokio::spawn(packetbridge::metrics::start_metrics_server(
        config.metrics_port,
    ));

    let queue = FrameQueue::new();

    let (publisher, mqtt_driver) = MqttPublisher::start(&config.mqtt);

    let tnc = TncClient::new(config.tnc.clone());
    let tnc_queue = queue.clone();
    let mut tnc_task = tokio::spawn(async move { tnc.run(tnc_queue).await });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received interrupt, shutting down"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let bridge = Bridge::new(queue, publisher);

    let result = tokio::select! {
        res = bridge.run(shutdown_rx) => res,
        res = &mut tnc_task => {
            // Loss of the TNC link is fatal for the bridge.
            match res {
                Ok(Ok(())) => Err(anyhow::anyhow!("KISS TNC stream ended")),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(anyhow::Error::new(e).context("TNC reader task panicked")),
            }
        }
    };

    // Stop background transports and release the metrics exporter.
    tnc_task.abort();
    mqtt_driver.abort();
    metrics_server.abort();

    info!("Bridge stopped");
    result
}
