//! Raw terminal passthrough.
//!
//! Relays bytes bidirectionally between the local terminal and the serial
//! link: keystrokes go to the device unbuffered and unechoed, device output
//! goes straight to stdout. The session ends when the operator presses ESC
//! or either side reaches end-of-stream, and the original terminal settings
//! are restored before returning.
//!
//! Two reader tasks perform independent blocking reads (stdin on a dedicated
//! blocking thread, the serial port via its timeout-bounded shared handle)
//! and feed one select loop that owns all writes, so exactly one consumer
//! arbitrates the two input sources at a time.

use std::io::{ErrorKind, Read, Write};

use anyhow::{anyhow, Context, Result};
use crossterm::terminal;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::serial::SharedSerialPort;

const ESC: u8 = 0x1b;

/// Why an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    EscapePressed,
    StdinClosed,
    SerialClosed,
}

/// Restores cooked mode even on early return or panic unwind.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to switch terminal to raw mode")?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Run an interactive passthrough session on the shared port.
pub async fn run(port: SharedSerialPort) -> Result<ExitReason> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(anyhow!("Terminal mode requires an interactive stdin (a tty)"));
    }

    println!("Terminal started. ESC to terminate.");
    let guard = RawModeGuard::enable()?;

    // Keystroke reader. One byte per read so ESC is seen the moment it is
    // typed; ends on stdin EOF.
    let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<Option<u8>>();
    tokio::task::spawn_blocking(move || {
        let mut stdin = std::io::stdin();
        let mut byte = [0u8; 1];
        loop {
            match stdin.read(&mut byte) {
                Ok(0) | Err(_) => {
                    let _ = stdin_tx.send(None);
                    break;
                }
                Ok(_) => {
                    if stdin_tx.send(Some(byte[0])).is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Device reader. Timeout-bounded reads keep the mutex hold short and let
    // the task notice session teardown between reads.
    let (serial_tx, mut serial_rx) = mpsc::unbounded_channel::<Option<Vec<u8>>>();
    let reader_port = port.clone();
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 256];
        loop {
            let result = reader_port.lock().unwrap().read(&mut buf);
            match result {
                Ok(0) => {
                    let _ = serial_tx.send(None);
                    break;
                }
                Ok(n) => {
                    if serial_tx.send(Some(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {
                    if serial_tx.is_closed() {
                        break;
                    }
                }
                Err(_) => {
                    let _ = serial_tx.send(None);
                    break;
                }
            }
        }
    });

    let mut stdout = std::io::stdout();
    let reason = loop {
        tokio::select! {
            key = stdin_rx.recv() => match key {
                Some(Some(ESC)) => {
                    print!("ESC key pressed, terminating\r\n");
                    let _ = stdout.flush();
                    break ExitReason::EscapePressed;
                }
                Some(Some(b)) => {
                    if let Err(e) = port.lock().unwrap().write_all(&[b]) {
                        warn!("Serial write failed (not retried): {}", e);
                    }
                }
                Some(None) | None => {
                    eprint!("\r\nEOF\r\n");
                    break ExitReason::StdinClosed;
                }
            },

            chunk = serial_rx.recv() => match chunk {
                Some(Some(bytes)) => {
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
                Some(None) | None => {
                    eprint!("\r\nEOF\r\n");
                    break ExitReason::SerialClosed;
                }
            },
        }
    };

    drop(guard);
    info!("Terminal session ended: {:?}", reason);
    Ok(reason)
}
