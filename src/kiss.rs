//! KISS framing between host and TNC.
//!
//! The TNC wraps each radio frame as `[FEND][type][escaped data][FEND]`.
//! The low nibble of the type byte is the command, the high nibble the TNC
//! port number. Only DATA frames carry AX.25 - everything else is TNC
//! tuning traffic and is skipped.

/// Frame delimiter.
pub const FEND: u8 = 0xC0;
/// Escape introducer.
pub const FESC: u8 = 0xDB;
/// Escaped FEND.
pub const TFEND: u8 = 0xDC;
/// Escaped FESC.
pub const TFESC: u8 = 0xDD;

/// Command nibble of a data frame.
pub const CMD_DATA: u8 = 0x00;

/// Wrap a payload as a KISS DATA frame for TNC port 0.
pub fn encode_frame(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 3);
    out.push(FEND);
    out.push(CMD_DATA);
    for &byte in data {
        match byte {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            other => out.push(other),
        }
    }
    out.push(FEND);
    out
}

/// Streaming deframer. Feed raw socket bytes, collect DATA frame payloads.
///
/// State survives arbitrary read boundaries, so a frame split across TCP
/// segments reassembles correctly.
#[derive(Debug, Default)]
pub struct Deframer {
    in_frame: bool,
    frame_type: Option<u8>,
    escaped: bool,
    buffer: Vec<u8>,
}

impl Deframer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `bytes`, returning the unescaped payload of every DATA frame
    /// completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        for &byte in bytes {
            if byte == FEND {
                // FEND both terminates the current frame and opens the next.
                if self.is_data_frame() && !self.buffer.is_empty() {
                    frames.push(std::mem::take(&mut self.buffer));
                }
                self.in_frame = true;
                self.frame_type = None;
                self.escaped = false;
                self.buffer.clear();
                continue;
            }

            if !self.in_frame {
                // Noise between frames.
                continue;
            }

            let Some(frame_type) = self.frame_type else {
                // First byte after FEND carries port and command.
                self.frame_type = Some(byte);
                continue;
            };

            if frame_type & 0x0F != CMD_DATA {
                continue;
            }

            if self.escaped {
                self.buffer.push(match byte {
                    TFEND => FEND,
                    TFESC => FESC,
                    // Invalid escape sequence, keep the byte as-is.
                    other => other,
                });
                self.escaped = false;
            } else if byte == FESC {
                self.escaped = true;
            } else {
                self.buffer.push(byte);
            }
        }

        frames
    }

    fn is_data_frame(&self) -> bool {
        self.in_frame && self.frame_type.is_some_and(|t| t & 0x0F == CMD_DATA)
    }
}
