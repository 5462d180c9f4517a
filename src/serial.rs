//! Serial transport setup.
//!
//! Opens the tty the way the diagnostic tools expect it: 8 data bits, no
//! parity, one stop bit, a short read timeout so blocking loops stay
//! responsive, and input purged of whatever the device printed before we
//! attached. The port is shared behind a mutex so an interactive session can
//! run an independent reader task and writer on the same descriptor.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::debug;
use serialport::SerialPort;
use tokio::time::sleep;

/// Line speeds the tools accept. Anything else is a config error.
pub const SUPPORTED_BAUDS: &[u32] = &[300, 9600, 19200, 38400, 57600, 115200];

/// Read timeout on the shared port. A timed-out read means "not readable
/// yet", never an error, so loops built on this port poll at this cadence.
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// A serial port shared between one reader and one writer.
pub type SharedSerialPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Open `port_name` at `baud_rate` as a shared port.
///
/// A failed open is fatal to the caller: the error carries the device path
/// and the OS diagnostic.
pub async fn open_shared(port_name: &str, baud_rate: u32) -> Result<SharedSerialPort> {
    debug!("Opening shared serial port {} at {} baud", port_name, baud_rate);

    let mut builder = serialport::new(port_name, baud_rate).timeout(READ_TIMEOUT);
    #[cfg(unix)]
    {
        builder = builder
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None);
    }
    let mut port = builder
        .open()
        .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;

    // Toggle DTR/RTS to ensure the device wakes (common for USB adapters)
    let _ = port.write_data_terminal_ready(true);
    let _ = port.write_request_to_send(true);
    sleep(Duration::from_millis(150)).await;

    // Clear any existing buffered startup text
    let mut purge_buf = [0u8; 512];
    if let Ok(available) = port.bytes_to_read() {
        if available > 0 {
            let _ = port.read(&mut purge_buf);
        }
    }

    debug!("Shared serial port initialized successfully");
    Ok(Arc::new(Mutex::new(port)))
}

/// RS-485 half-duplex transmit-enable control: assert DTR and drop RTS so a
/// shared pair carries only one transmitter at a time.
///
/// Failures here are fatal to the caller, unlike the best-effort wake toggle
/// in [`open_shared`].
pub fn set_half_duplex(port: &SharedSerialPort) -> Result<()> {
    let mut guard = port.lock().unwrap();
    guard
        .write_data_terminal_ready(true)
        .map_err(|e| anyhow!("Line control failed (DTR): {}", e))?;
    guard
        .write_request_to_send(false)
        .map_err(|e| anyhow!("Line control failed (RTS): {}", e))?;
    debug!("Half-duplex line control set: DTR on, RTS off");
    Ok(())
}

/// `Read + Write` adapter over a [`SharedSerialPort`], locking per call.
///
/// Lets transport-generic components (responder, beacon) run over the real
/// device without owning it outright.
pub struct SharedPort(pub SharedSerialPort);

impl Read for SharedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.lock().unwrap().read(buf)
    }
}

impl Write for SharedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}
