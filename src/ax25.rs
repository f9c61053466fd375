//! AX.25 link-layer frame decoding.
//!
//! Address bytes carry the callsign ASCII shifted left one bit; the seventh
//! byte of each address packs the SSID (bits 1-4), the H bit (bit 7) and
//! the extension bit (bit 0) that terminates the address field.

use std::fmt;

use thiserror::Error;

/// Shortest decodable frame: destination (7) + source (7) + control (1).
const MIN_FRAME_LEN: usize = 15;
/// Length of one encoded address.
const ADDR_LEN: usize = 7;
/// UI control byte with the poll/final bit masked off.
const CONTROL_UI: u8 = 0x03;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    Truncated(usize),
    #[error("address field not terminated before end of frame")]
    UnterminatedAddressField,
    #[error("empty callsign in address field")]
    EmptyCallsign,
}

/// One AX.25 station address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub callsign: String,
    /// Station identifier, 0-15. Zero renders with no suffix.
    pub ssid: u8,
    /// True when this address was parsed from the digipeater path.
    pub is_repeater: bool,
}

impl Address {
    fn from_bytes(bytes: &[u8], is_repeater: bool) -> Result<Self, FrameError> {
        let callsign: String = bytes[..6]
            .iter()
            .map(|&b| (b >> 1) as char)
            .collect::<String>()
            .trim_end()
            .to_string();

        if callsign.is_empty() {
            return Err(FrameError::EmptyCallsign);
        }

        Ok(Self {
            callsign,
            ssid: (bytes[6] >> 1) & 0x0F,
            is_repeater,
        })
    }

    /// Encode as 7 wire bytes, space-padding the callsign. Used to build
    /// frames for loopback and tests; the bridge itself never transmits.
    pub fn to_bytes(&self, last: bool) -> [u8; 7] {
        let mut bytes = [b' ' << 1; 7];
        for (slot, ch) in bytes[..6].iter_mut().zip(self.callsign.bytes().take(6)) {
            *slot = ch << 1;
        }

        // Reserved bits set per convention.
        let mut ssid_byte = 0x60 | ((self.ssid & 0x0F) << 1);
        if last {
            ssid_byte |= 0x01;
        }
        bytes[6] = ssid_byte;
        bytes
    }
}

/// TNC2 textual notation: `CALL` for SSID zero, `CALL-SSID` otherwise.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid > 0 {
            write!(f, "{}-{}", self.callsign, self.ssid)
        } else {
            write!(f, "{}", self.callsign)
        }
    }
}

/// One entry in the digipeater path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeaterHop {
    pub address: Address,
    /// H bit: set once this hop has actually relayed the frame.
    pub has_been_repeated: bool,
}

impl RepeaterHop {
    /// Encode as 7 wire bytes with the H bit applied. Test helper, same as
    /// [`Address::to_bytes`].
    pub fn to_bytes(&self, last: bool) -> [u8; 7] {
        let mut bytes = self.address.to_bytes(last);
        if self.has_been_repeated {
            bytes[6] |= 0x80;
        }
        bytes
    }
}

/// A decoded AX.25 frame.
///
/// Constructed once per successfully decoded radio packet and consumed by
/// the envelope builder. `control` and `pid` come off the wire but are not
/// republished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub src: Address,
    pub dst: Address,
    pub via: Vec<RepeaterHop>,
    pub control: u8,
    /// Protocol identifier, present on UI and I frames only.
    pub pid: Option<u8>,
    pub payload: Vec<u8>,
}

impl DecodedFrame {
    /// Decode a frame from raw bytes (after KISS deframing).
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(FrameError::Truncated(data.len()));
        }

        // Destination comes first on the wire.
        let dst = Address::from_bytes(&data[0..ADDR_LEN], false)?;
        let src = Address::from_bytes(&data[ADDR_LEN..2 * ADDR_LEN], false)?;

        let mut pos = 2 * ADDR_LEN;
        let mut via = Vec::new();
        let mut terminated = data[2 * ADDR_LEN - 1] & 0x01 != 0;
        while !terminated {
            if pos + ADDR_LEN > data.len() {
                return Err(FrameError::UnterminatedAddressField);
            }
            let hop_bytes = &data[pos..pos + ADDR_LEN];
            via.push(RepeaterHop {
                address: Address::from_bytes(hop_bytes, true)?,
                has_been_repeated: hop_bytes[6] & 0x80 != 0,
            });
            terminated = hop_bytes[6] & 0x01 != 0;
            pos += ADDR_LEN;
        }

        let Some(&control) = data.get(pos) else {
            return Err(FrameError::Truncated(data.len()));
        };
        pos += 1;

        // UI and I frames carry a PID byte between control and payload.
        let has_pid = control & 0x01 == 0 || control & 0xEF == CONTROL_UI;
        let pid = if has_pid { data.get(pos).copied() } else { None };
        if pid.is_some() {
            pos += 1;
        }

        Ok(Self {
            src,
            dst,
            via,
            control,
            pid,
            payload: data.get(pos..).unwrap_or_default().to_vec(),
        })
    }

    /// Rebuild the TNC2 monitor header: `SRC>DST,HOP1,HOP2`.
    ///
    /// The decoder yields structured addresses, not the original monitor
    /// text, so the header is reassembled from the same fields that fill
    /// the published address blocks - the two can never disagree. Every via
    /// entry is rendered whether or not its H bit is set, matching how TNC2
    /// text shows the full declared path.
    pub fn monitor_header(&self) -> String {
        let mut header = format!("{}>{}", self.src, self.dst);
        for hop in &self.via {
            header.push(',');
            header.push_str(&hop.address.to_string());
        }
        header
    }

    /// True when the frame carries a digipeater path, used or not.
    pub fn is_repeated(&self) -> bool {
        !self.via.is_empty()
    }
}
