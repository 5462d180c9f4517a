//! # nhacpdiag - Serial Diagnostic Utilities for NHACP-style Links
//!
//! nhacpdiag is a grab bag of serial-port diagnostic tools for exercising an
//! NHACP-like framed message protocol over a tty device: a raw terminal
//! passthrough, a hexdump formatter, a message-framing test beacon, and a
//! minimal responder daemon.
//!
//! ## Features
//!
//! - **Framed Message Codec**: fixed-layout binary records bounded by
//!   start/end marker bytes, packed little-endian with explicit
//!   field-by-field serialization.
//! - **Responder Daemon**: minimal request/response loop that answers every
//!   received chunk with one data buffer frame carrying a wrapping sequence
//!   counter.
//! - **Test Beacon**: transmits fixed sample frames on a steady cadence to
//!   exercise a receiver under test.
//! - **Terminal Passthrough**: raw-mode interactive session relaying bytes
//!   between the local terminal and the device.
//! - **Async Design**: built with Tokio; blocking device reads are bounded
//!   by a short timeout so loops stay responsive to shutdown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nhacpdiag::config::Config;
//! use nhacpdiag::responder::Responder;
//! use nhacpdiag::serial::{self, SharedPort};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("nhacpdiag.toml").await?;
//!     let port = serial::open_shared(&config.serial.port, config.serial.baud_rate).await?;
//!     let mut responder = Responder::new(SharedPort(port), &config.responder);
//!     responder.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`protocol`] - Framed message codec (wire records, markers, decode)
//! - [`responder`] - Responder daemon loop
//! - [`beacon`] - Message-framing test beacon
//! - [`terminal`] - Raw terminal passthrough
//! - [`serial`] - Serial line setup and the shared port handle
//! - [`hexdump`] - Hex dump formatter
//! - [`config`] - Configuration management and validation

pub mod beacon;
pub mod config;
pub mod hexdump;
pub mod logutil;
pub mod protocol;
pub mod responder;
pub mod serial;
pub mod terminal;
