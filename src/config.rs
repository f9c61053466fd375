//! Environment-sourced process configuration.
//!
//! Every knob is a key=value environment entry with a default, one env file
//! per bridge instance. `dotenvy` loads `.env` before this module reads
//! anything.

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Read `key` from the environment, falling back to `default` when the key
/// is unset or its value does not parse.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value {:?} for {}, using default", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

/// Connection settings for the MQTT side.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub topic: String,
}

/// Connection settings for the KISS TNC side.
#[derive(Debug, Clone)]
pub struct TncConfig {
    pub host: String,
    pub port: u16,
}

/// Full bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt: MqttConfig,
    pub tnc: TncConfig,
    pub metrics_port: u16,
}

impl BridgeConfig {
    /// Load from the environment, applying defaults for unset keys.
    pub fn from_env() -> Self {
        Self {
            mqtt: MqttConfig {
                broker: env_or("MQTT_BROKER", "127.0.0.1".to_string()),
                port: env_or("MQTT_PORT", 1884),
                topic: env_or("MQTT_TOPIC", "aprs/packets".to_string()),
            },
            tnc: TncConfig {
                host: env_or("KISS_TNC_HOST", "127.0.0.1".to_string()),
                port: env_or("KISS_TNC_PORT", 8001),
            },
            metrics_port: env_or("METRICS_PORT", 7373),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "MQTT_BROKER",
        "MQTT_PORT",
        "MQTT_TOPIC",
        "KISS_TNC_HOST",
        "KISS_TNC_PORT",
        "METRICS_PORT",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = BridgeConfig::from_env();

        assert_eq!(config.mqtt.broker, "127.0.0.1");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.topic, "aprs/packets");
        assert_eq!(config.tnc.host, "127.0.0.1");
        assert_eq!(config.tnc.port, 8001);
        assert_eq!(config.metrics_port, 7373);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        unsafe {
            env::set_var("MQTT_BROKER", "broker.example.org");
            env::set_var("MQTT_PORT", "1883");
            env::set_var("MQTT_TOPIC", "radio/ax25");
            env::set_var("KISS_TNC_PORT", "8100");
        }

        let config = BridgeConfig::from_env();
        assert_eq!(config.mqtt.broker, "broker.example.org");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic, "radio/ax25");
        assert_eq!(config.tnc.port, 8100);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparseable_port_falls_back() {
        clear_env();
        unsafe { env::set_var("MQTT_PORT", "not-a-port") };

        let config = BridgeConfig::from_env();
        assert_eq!(config.mqtt.port, 1884);

        clear_env();
    }
}
