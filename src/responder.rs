//! Responder daemon for the framed message link.
//!
//! Implements the minimal duplex exchange the protocol defines: wait for the
//! transport to become readable, take whatever one read call returns as one
//! received frame, dump it, wait a fixed delay, and transmit exactly one
//! data buffer response. The first payload byte of successive responses is a
//! wrapping sequence counter so a receiver under test can tell responses
//! apart; it carries no protocol meaning.
//!
//! The counter is owned by the responder instance, so independent sessions
//! never interfere. Write failures are logged and never retried.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, trace, warn};

use crate::config::ResponderConfig;
use crate::hexdump::hexdump;
use crate::logutil::hex_snippet;
use crate::protocol::{DataBufferResponse, DATA_BUFFER_PAYLOAD_LEN};

/// Counters reported when a session ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResponderStats {
    pub chunks_received: u64,
    pub frames_sent: u64,
}

/// What one loop iteration observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A non-empty chunk arrived and one response frame was transmitted.
    Replied(usize),
    /// Nothing readable within the transport's timeout.
    Idle,
    /// Zero-length read (end-of-stream sentinel). Ignored; keep waiting.
    Eof,
}

/// Request/response loop over any byte-oriented transport.
pub struct Responder<T> {
    transport: T,
    read_chunk: usize,
    response_delay: Duration,
    ctr: u8,
    stats: ResponderStats,
}

impl<T: Read + Write> Responder<T> {
    pub fn new(transport: T, config: &ResponderConfig) -> Self {
        Self {
            transport,
            read_chunk: config.read_chunk,
            response_delay: Duration::from_millis(config.response_delay_ms),
            ctr: 0,
            stats: ResponderStats::default(),
        }
    }

    pub fn stats(&self) -> ResponderStats {
        self.stats
    }

    /// One iteration: read up to `read_chunk` bytes, and when the chunk is
    /// non-empty, dump it, wait, and answer with a single response frame.
    pub async fn step(&mut self) -> Result<StepOutcome> {
        let mut buf = vec![0u8; self.read_chunk];
        match self.transport.read(&mut buf) {
            Ok(0) => {
                debug!("Zero-length read, resuming wait");
                Ok(StepOutcome::Eof)
            }
            Ok(n) => {
                let chunk = &buf[..n];
                trace!("RX {} bytes: {}", n, hex_snippet(chunk, 64));
                println!("RX:");
                print!("{}", hexdump(chunk));
                self.stats.chunks_received += 1;

                tokio::time::sleep(self.response_delay).await;
                self.send_data_buffer();
                Ok(StepOutcome::Replied(n))
            }
            Err(ref e)
                if e.kind() == ErrorKind::TimedOut
                    || e.kind() == ErrorKind::WouldBlock
                    || e.kind() == ErrorKind::Interrupted =>
            {
                Ok(StepOutcome::Idle)
            }
            Err(e) => {
                warn!("Transport read error (continuing): {}", e);
                Ok(StepOutcome::Idle)
            }
        }
    }

    /// Run until Ctrl-C, then report session counters.
    pub async fn run(&mut self) -> Result<()> {
        info!("Responder started (delay {:?})", self.response_delay);
        loop {
            tokio::select! {
                outcome = self.step() => {
                    if let StepOutcome::Replied(n) = outcome? {
                        debug!("Answered {}-byte chunk with frame #{}", n, self.stats.frames_sent);
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }
        info!(
            "Responder session: {} chunks received, {} frames sent",
            self.stats.chunks_received, self.stats.frames_sent
        );
        Ok(())
    }

    /// Transmit one data buffer frame with the sequence counter in the first
    /// payload byte. Fire-and-forget by contract: a failed write is reported
    /// and abandoned.
    fn send_data_buffer(&mut self) {
        let mut data = [0u8; DATA_BUFFER_PAYLOAD_LEN];
        for (i, b) in data.iter_mut().enumerate().take(11) {
            *b = i as u8;
        }
        data[0] = self.ctr;
        self.ctr = self.ctr.wrapping_add(1);

        let wire = DataBufferResponse::new(data).encode();
        println!("TX:");
        print!("{}", hexdump(&wire));

        if let Err(e) = self.transport.write_all(&wire) {
            error!("Frame write failed (not retried): {}", e);
            return;
        }
        if let Err(e) = self.transport.flush() {
            error!("Frame flush failed (not retried): {}", e);
            return;
        }
        self.stats.frames_sent += 1;
    }
}
