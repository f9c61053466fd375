//! Outgoing message shape for the MQTT bus.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ax25::{Address, DecodedFrame, RepeaterHop};

/// Address block of the published JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeAddress {
    pub call: String,
    pub ssid: u8,
    pub is_repeater: bool,
}

impl From<&Address> for EnvelopeAddress {
    fn from(address: &Address) -> Self {
        Self {
            call: address.callsign.clone(),
            ssid: address.ssid,
            is_repeater: address.is_repeater,
        }
    }
}

/// Digipeater entry of the published JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHop {
    pub call: String,
    pub ssid: u8,
    pub has_been_repeated: bool,
    pub is_repeater: bool,
}

impl From<&RepeaterHop> for EnvelopeHop {
    fn from(hop: &RepeaterHop) -> Self {
        Self {
            call: hop.address.callsign.clone(),
            ssid: hop.address.ssid,
            has_been_repeated: hop.has_been_repeated,
            is_repeater: hop.address.is_repeater,
        }
    }
}

/// One decoded frame as published to the bus.
///
/// `data` is the reconstructed TNC2 monitor text, `timestamp` the local
/// wall-clock arrival time at second precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketEnvelope {
    pub src: EnvelopeAddress,
    pub dst: EnvelopeAddress,
    pub via: Vec<EnvelopeHop>,
    pub data: String,
    pub timestamp: String,
}

impl PacketEnvelope {
    /// Build the envelope for one frame.
    ///
    /// A payload that is not 7-bit clean text degrades to an empty data
    /// suffix rather than failing the envelope - the src/dst/via metadata
    /// is still worth publishing.
    pub fn build(frame: &DecodedFrame, received_at: DateTime<Local>) -> Self {
        let text = match std::str::from_utf8(&frame.payload) {
            Ok(text) if text.is_ascii() => text,
            _ => {
                warn!(
                    "Frame payload from {} is not ASCII text, publishing empty data suffix",
                    frame.src
                );
                ""
            }
        };

        Self {
            src: EnvelopeAddress::from(&frame.src),
            dst: EnvelopeAddress::from(&frame.dst),
            via: frame.via.iter().map(EnvelopeHop::from).collect(),
            data: format!("{}:{}", frame.monitor_header(), text),
            timestamp: received_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn address(callsign: &str, ssid: u8) -> Address {
        Address {
            callsign: callsign.to_string(),
            ssid,
            is_repeater: false,
        }
    }

    fn frame(src: Address, dst: Address, via: Vec<RepeaterHop>, payload: &[u8]) -> DecodedFrame {
        DecodedFrame {
            src,
            dst,
            via,
            control: 0x03,
            pid: Some(0xF0),
            payload: payload.to_vec(),
        }
    }

    fn test_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 15, 12, 30, 45).unwrap()
    }

    #[test]
    fn test_build_simple_frame() {
        let frame = frame(address("N0CALL", 0), address("APRS", 0), vec![], b"Hello");
        let envelope = PacketEnvelope::build(&frame, test_time());

        assert_eq!(envelope.src.call, "N0CALL");
        assert_eq!(envelope.src.ssid, 0);
        assert!(!envelope.src.is_repeater);
        assert_eq!(envelope.dst.call, "APRS");
        assert!(envelope.via.is_empty());
        assert_eq!(envelope.data, "N0CALL>APRS:Hello");
        assert_eq!(envelope.timestamp, "2025-06-15 12:30:45");
    }

    #[test]
    fn test_build_repeated_frame() {
        let via = vec![RepeaterHop {
            address: Address {
                callsign: "WIDE1".to_string(),
                ssid: 1,
                is_repeater: true,
            },
            has_been_repeated: true,
        }];
        let frame = frame(address("W1AW", 1), address("BEACON", 0), via, b"Test");
        assert!(frame.is_repeated());

        let envelope = PacketEnvelope::build(&frame, test_time());
        assert_eq!(envelope.data, "W1AW-1>BEACON,WIDE1-1:Test");
        assert_eq!(envelope.via.len(), 1);
        assert_eq!(envelope.via[0].call, "WIDE1");
        assert_eq!(envelope.via[0].ssid, 1);
        assert!(envelope.via[0].has_been_repeated);
        assert!(envelope.via[0].is_repeater);
    }

    #[test]
    fn test_non_ascii_payload_degrades_to_empty_suffix() {
        let frame = frame(
            address("N0CALL", 0),
            address("APRS", 0),
            vec![],
            &[0xFF, 0xFE, 0x01],
        );
        let envelope = PacketEnvelope::build(&frame, test_time());
        assert_eq!(envelope.data, "N0CALL>APRS:");
    }

    #[test]
    fn test_utf8_but_not_ascii_payload_degrades() {
        let frame = frame(
            address("N0CALL", 0),
            address("APRS", 0),
            vec![],
            "héllo".as_bytes(),
        );
        let envelope = PacketEnvelope::build(&frame, test_time());
        assert_eq!(envelope.data, "N0CALL>APRS:");
    }

    #[test]
    fn test_data_field_round_trips_header() {
        let via = vec![RepeaterHop {
            address: Address {
                callsign: "WIDE2".to_string(),
                ssid: 2,
                is_repeater: true,
            },
            has_been_repeated: false,
        }];
        let frame = frame(address("K1ABC", 9), address("APDW17", 0), via, b">status");
        let envelope = PacketEnvelope::build(&frame, test_time());

        let (header, _payload) = envelope.data.split_once(':').unwrap();
        assert_eq!(header, frame.monitor_header());
    }

    #[test]
    fn test_build_is_idempotent() {
        let frame = frame(address("N0CALL", 3), address("APRS", 0), vec![], b"!4903.50N");
        let when = test_time();

        let first = serde_json::to_string(&PacketEnvelope::build(&frame, when)).unwrap();
        let second = serde_json::to_string(&PacketEnvelope::build(&frame, when)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_json_field_names_and_order() {
        let frame = frame(address("N0CALL", 0), address("APRS", 0), vec![], b"Hi");
        let json = serde_json::to_string(&PacketEnvelope::build(&frame, test_time())).unwrap();

        assert_eq!(
            json,
            "{\"src\":{\"call\":\"N0CALL\",\"ssid\":0,\"is_repeater\":false},\
             \"dst\":{\"call\":\"APRS\",\"ssid\":0,\"is_repeater\":false},\
             \"via\":[],\
             \"data\":\"N0CALL>APRS:Hi\",\
             \"timestamp\":\"2025-06-15 12:30:45\"}"
        );
    }
}
