//! packetbridge - KISS TNC to MQTT bridge
//!
//! Connects to a TNC speaking the KISS framing protocol, decodes the AX.25
//! frames it delivers, and republishes each one to an MQTT broker as a JSON
//! document carrying the station addresses, the reconstructed TNC2 monitor
//! text and the arrival timestamp.

pub mod ax25;
pub mod bridge;
pub mod config;
pub mod envelope;
pub mod kiss;
pub mod metrics;
pub mod mqtt;
pub mod queue;
pub mod tnc_client;

pub use ax25::{Address, DecodedFrame, FrameError, RepeaterHop};
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use envelope::PacketEnvelope;
pub use mqtt::MqttPublisher;
pub use queue::{ArrivalRecord, FrameQueue};
pub use tnc_client::TncClient;
