//! The publish loop: sole consumer of the ingestion queue.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use crate::envelope::PacketEnvelope;
use crate::mqtt::MqttPublisher;
use crate::queue::{ArrivalRecord, FrameQueue};

/// Idle poll interval when the queue is empty.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Consumes arrival records and republishes them to the bus.
pub struct Bridge {
    queue: FrameQueue,
    publisher: MqttPublisher,
}

impl Bridge {
    pub fn new(queue: FrameQueue, publisher: MqttPublisher) -> Self {
        Self { queue, publisher }
    }

    /// Drain the queue until shutdown is signalled.
    ///
    /// Shutdown is only observed between records, so an in-flight publish
    /// always completes before the loop exits. Records still queued at that
    /// point are dropped with a log line.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Publish loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.queue.try_pop() {
                Some(record) => self.publish_record(record).await,
                None => {
                    // Cooperative idle: sleep briefly, wake early on shutdown.
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                // Shutdown channel gone; nothing can stop
                                // the loop gracefully anymore, so stop now.
                                break;
                            }
                        }
                    }
                }
            }
        }

        let left_behind = self.queue.len();
        if left_behind > 0 {
            info!("Publish loop stopping with {} records unpublished", left_behind);
        } else {
            info!("Publish loop stopping");
        }

        Ok(())
    }

    async fn publish_record(&self, record: ArrivalRecord) {
        let is_repeated = record.frame.is_repeated();
        let envelope = PacketEnvelope::build(&record.frame, record.received_at);

        metrics::counter!(
            "packets",
            "unpacked" => "true",
            "repeated" => if is_repeated { "true" } else { "false" }
        )
        .increment(1);

        // A failed publish is logged and the frame dropped. Retrying here
        // would mask a broker outage that the logs and the connection
        // counter should surface instead.
        match self.publisher.publish(&envelope).await {
            Ok(()) => info!("Published {}", envelope.data),
            Err(e) => error!("Failed to publish frame: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ax25::{Address, DecodedFrame};
    use crate::config::MqttConfig;
    use chrono::Local;

    fn record(callsign: &str) -> ArrivalRecord {
        let address = |c: &str| Address {
            callsign: c.to_string(),
            ssid: 0,
            is_repeater: false,
        };
        ArrivalRecord {
            frame: DecodedFrame {
                src: address(callsign),
                dst: address("APRS"),
                via: vec![],
                control: 0x03,
                pid: Some(0xF0),
                payload: b"test".to_vec(),
            },
            received_at: Local::now(),
        }
    }

    /// A publisher whose event loop is never polled: publishes land in the
    /// client's request channel, which is enough to exercise the loop.
    fn detached_publisher() -> MqttPublisher {
        let config = MqttConfig {
            broker: "127.0.0.1".to_string(),
            port: 1,
            topic: "test/packets".to_string(),
        };
        let (publisher, driver) = MqttPublisher::start(&config);
        driver.abort();
        publisher
    }

    #[tokio::test]
    async fn test_drains_queue_then_stops_on_shutdown() {
        let queue = FrameQueue::new();
        queue.push(record("AA1AA"));
        queue.push(record("BB2BB"));

        let bridge = Bridge::new(queue.clone(), detached_publisher());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = tokio::spawn(async move { bridge.run(shutdown_rx).await });

        // Give the loop a moment to drain, then stop it.
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();

        run.await.unwrap().unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_stops_promptly_while_idle() {
        let bridge = Bridge::new(FrameQueue::new(), detached_publisher());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = tokio::spawn(async move { bridge.run(shutdown_rx).await });
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("loop should stop within the timeout")
            .unwrap()
            .unwrap();
    }
}
