//! TCP client for the KISS TNC.
//!
//! Owns the socket read loop and the decode callback: raw bytes are
//! deframed, each data frame is handed to the AX.25 decoder, and decoded
//! frames enter the ingestion queue stamped with their arrival time. A
//! frame that fails to decode is counted and dropped; one bad frame never
//! interrupts the read loop.

use anyhow::{Context, Result, bail};
use chrono::Local;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{info, trace, warn};

use crate::ax25::DecodedFrame;
use crate::config::TncConfig;
use crate::kiss::Deframer;
use crate::queue::{ArrivalRecord, FrameQueue};

const READ_BUFFER_SIZE: usize = 4096;

/// Client for one KISS TNC connection.
pub struct TncClient {
    config: TncConfig,
}

impl TncClient {
    pub fn new(config: TncConfig) -> Self {
        Self { config }
    }

    /// Connect to the TNC and pump frames into the queue until the
    /// connection ends. Loss of the TNC link is fatal for the bridge: the
    /// error propagates to the caller and no reconnect is attempted here.
    pub async fn run(&self, queue: FrameQueue) -> Result<()> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to KISS TNC at {}", address);

        let mut stream = TcpStream::connect(&address)
            .await
            .with_context(|| format!("Failed to connect to KISS TNC at {}", address))?;
        info!("Connected to KISS TNC at {}", address);
        metrics::gauge!("tnc_connected").set(1.0);

        let mut deframer = Deframer::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            let n = stream
                .read(&mut buf)
                .await
                .context("Failed to read from KISS TNC")?;
            if n == 0 {
                metrics::gauge!("tnc_connected").set(0.0);
                bail!("KISS TNC closed the connection");
            }

            for frame_bytes in deframer.feed(&buf[..n]) {
                Self::handle_frame(&frame_bytes, &queue);
            }
        }
    }

    /// Decode callback for one deframed KISS payload. Runs in the reader
    /// task and must return quickly; the queue push never blocks.
    fn handle_frame(bytes: &[u8], queue: &FrameQueue) {
        match DecodedFrame::decode(bytes) {
            Ok(frame) => {
                trace!("Received {}", frame.monitor_header());
                queue.push(ArrivalRecord {
                    frame,
                    received_at: Local::now(),
                });
            }
            Err(e) => {
                warn!("Failed to unpack AX.25 frame ({} bytes): {}", bytes.len(), e);
                metrics::counter!("packets", "unpacked" => "false").increment(1);
            }
        }
    }
}
