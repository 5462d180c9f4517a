//! Message-framing test beacon.
//!
//! Repeatedly transmits fixed sample frames without waiting for any
//! response, to exercise a receiver under test: one patterned data buffer
//! frame, a short gap, one get-block request, then a longer sleep before the
//! next burst. Payload bytes are filler that needs no escaping; the first
//! payload byte carries the same wrapping sequence counter the responder
//! uses so bursts are distinguishable on a logic analyzer.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use log::{error, info};

use crate::config::BeaconConfig;
use crate::hexdump::hexdump;
use crate::protocol::{DataBufferResponse, GetBlockRequest, DATA_BUFFER_PAYLOAD_LEN};

/// Beacon over any writable transport.
pub struct Beacon<T> {
    transport: T,
    burst_gap: Duration,
    interval: Duration,
    ctr: u8,
    bursts: u64,
}

impl<T: Write> Beacon<T> {
    pub fn new(transport: T, config: &BeaconConfig) -> Self {
        Self {
            transport,
            burst_gap: Duration::from_millis(config.burst_gap_ms),
            interval: Duration::from_millis(config.interval_ms),
            ctr: 0,
            bursts: 0,
        }
    }

    pub fn bursts_sent(&self) -> u64 {
        self.bursts
    }

    /// Transmit one burst: data buffer frame, gap, get-block request.
    pub async fn burst(&mut self) -> Result<()> {
        let mut data = [b'z'; DATA_BUFFER_PAYLOAD_LEN];
        data[0] = self.ctr;
        self.ctr = self.ctr.wrapping_add(1);
        self.send(&DataBufferResponse::new(data).encode());

        tokio::time::sleep(self.burst_gap).await;

        let req = GetBlockRequest {
            index: 0,
            block: self.bursts as u32,
            len: DATA_BUFFER_PAYLOAD_LEN as u16,
        };
        self.send(&req.encode());

        self.bursts += 1;
        Ok(())
    }

    /// Run until Ctrl-C.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Beacon started (gap {:?}, interval {:?})",
            self.burst_gap, self.interval
        );
        loop {
            let interval = self.interval;
            tokio::select! {
                res = async {
                    self.burst().await?;
                    tokio::time::sleep(interval).await;
                    Ok::<_, anyhow::Error>(())
                } => res?,

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }
        info!("Beacon session: {} bursts sent", self.bursts);
        Ok(())
    }

    fn send(&mut self, wire: &[u8]) {
        println!("TX:");
        print!("{}", hexdump(wire));
        if let Err(e) = self.transport.write_all(wire) {
            error!("Frame write failed (not retried): {}", e);
            return;
        }
        if let Err(e) = self.transport.flush() {
            error!("Frame flush failed (not retried): {}", e);
        }
    }
}
