//! Binary entrypoint for the nhacpdiag CLI.
//!
//! Commands:
//! - `respond [--port <path>]` - run the framed-message responder daemon
//! - `beacon [--port <path>]` - transmit fixed sample frames on a cadence
//! - `terminal [--port <path>]` - raw interactive passthrough session
//! - `dump <file>` - hexdump a file (or `-` for stdin) to stdout
//! - `probe [--port <path>] [--timeout <s>]` - send one request, report JSON
//! - `init` - create a starter `nhacpdiag.toml`
//!
//! See the library crate docs for module-level details: `nhacpdiag::`.
use std::io::{ErrorKind, Read, Write};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

// Use the published library crate modules instead of redefining them here.
use nhacpdiag::beacon::Beacon;
use nhacpdiag::config::Config;
use nhacpdiag::hexdump::hexdump;
use nhacpdiag::protocol::{self, GetBlockRequest, DATA_BUFFER_PAYLOAD_LEN};
use nhacpdiag::responder::Responder;
use nhacpdiag::serial::{self, SharedPort, SharedSerialPort, SUPPORTED_BAUDS};
use nhacpdiag::terminal;

#[derive(Parser)]
#[command(name = "nhacpdiag")]
#[command(about = "Serial-port diagnostic utilities for NHACP-style framed message links")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "nhacpdiag.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the responder daemon: answer every received chunk with one frame
    Respond {
        /// Serial device port (e.g., /dev/ttyUSB1)
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short = 'b', long)]
        baud: Option<u32>,
        /// RS-485 half-duplex transmit-enable control (DTR on, RTS off)
        #[arg(long)]
        rts485: bool,
    },
    /// Transmit fixed sample frames without waiting for responses
    Beacon {
        /// Serial device port
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short = 'b', long)]
        baud: Option<u32>,
        /// RS-485 half-duplex transmit-enable control (DTR on, RTS off)
        #[arg(long)]
        rts485: bool,
    },
    /// Interactive raw-mode terminal session on the device
    Terminal {
        /// Serial device port
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short = 'b', long)]
        baud: Option<u32>,
        /// RS-485 half-duplex transmit-enable control (DTR on, RTS off)
        #[arg(long)]
        rts485: bool,
    },
    /// Hexdump a file ("-" reads stdin) to stdout
    Dump {
        /// File to dump
        file: String,
    },
    /// Send one get-block request and report what came back
    Probe {
        /// Serial device port
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short = 'b', long)]
        baud: Option<u32>,
        /// Seconds to wait before giving up
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },
    /// Initialize a new configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes default later)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Respond { port, baud, rts485 } => {
            let config = effective_config(pre_config, &cli.config).await?;
            let link = open_link(&config, port, baud, rts485).await?;
            let mut responder = Responder::new(SharedPort(link), &config.responder);
            responder.run().await?;
        }
        Commands::Beacon { port, baud, rts485 } => {
            let config = effective_config(pre_config, &cli.config).await?;
            let link = open_link(&config, port, baud, rts485).await?;
            let mut beacon = Beacon::new(SharedPort(link), &config.beacon);
            beacon.run().await?;
        }
        Commands::Terminal { port, baud, rts485 } => {
            let config = effective_config(pre_config, &cli.config).await?;
            let link = open_link(&config, port, baud, rts485).await?;
            terminal::run(link).await?;
        }
        Commands::Dump { file } => {
            let bytes = if file == "-" {
                let mut buf = Vec::new();
                std::io::stdin().read_to_end(&mut buf)?;
                buf
            } else {
                tokio::fs::read(&file)
                    .await
                    .map_err(|e| anyhow!("Failed to read {}: {}", file, e))?
            };
            print!("{}", hexdump(&bytes));
        }
        Commands::Probe { port, baud, timeout } => {
            let config = effective_config(pre_config, &cli.config).await?;
            let link = open_link(&config, port, baud, false).await?;
            run_probe(link, timeout).await?;
        }
        Commands::Init => {
            info!("Initializing new configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
    }

    Ok(())
}

/// Config resolution: prefer the pre-loaded file, fall back to defaults when
/// the file simply does not exist yet (CLI flags still apply on top).
async fn effective_config(pre_config: Option<Config>, path: &str) -> Result<Config> {
    match pre_config {
        Some(config) => Ok(config),
        None => {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                // The file exists but did not load: surface the parse error.
                Config::load(path).await
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Open the serial link with CLI flags taking precedence over config values.
async fn open_link(
    config: &Config,
    port: Option<String>,
    baud: Option<u32>,
    rts485: bool,
) -> Result<SharedSerialPort> {
    let port = port.unwrap_or_else(|| config.serial.port.clone());
    let baud = baud.unwrap_or(config.serial.baud_rate);
    let rts485 = rts485 || config.serial.rts485;

    if !SUPPORTED_BAUDS.contains(&baud) {
        return Err(anyhow!(
            "unsupported baud rate {} (supported: {:?})",
            baud,
            SUPPORTED_BAUDS
        ));
    }

    info!("Opening {} at {} baud", port, baud);
    let link = serial::open_shared(&port, baud).await?;
    if rts485 {
        serial::set_half_duplex(&link)?;
    }
    Ok(link)
}

/// Send one request frame, collect whatever arrives before the deadline, and
/// print a machine-readable summary. Exits 0 when the device answered.
async fn run_probe(link: SharedSerialPort, timeout: u64) -> Result<()> {
    use tokio::time::{Duration, Instant};

    let mut transport = SharedPort(link);
    let request = GetBlockRequest {
        index: 0,
        block: 0,
        len: DATA_BUFFER_PAYLOAD_LEN as u16,
    };
    transport
        .write_all(&request.encode())
        .map_err(|e| anyhow!("Probe request write failed: {}", e))?;
    info!("Probe request sent, waiting up to {}s", timeout);

    let deadline = Instant::now() + Duration::from_secs(timeout);
    let mut received: Vec<u8> = Vec::new();
    let mut first_chunk: Option<Vec<u8>> = None;
    while Instant::now() < deadline {
        let mut buf = [0u8; 256];
        match transport.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if first_chunk.is_none() {
                    first_chunk = Some(buf[..n].to_vec());
                }
                received.extend_from_slice(&buf[..n]);
            }
            Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                continue;
            }
            Err(e) => return Err(anyhow!("Probe read failed: {}", e)),
        }
    }

    let decoded = first_chunk.as_deref().map(protocol::decode);
    let frame_type = match &decoded {
        Some(Ok(frame)) => Some(format!("0x{:02x}", frame.msg_type())),
        _ => None,
    };
    let status_ok = !received.is_empty();
    let payload = serde_json::json!({
        "status": if status_ok { "ok" } else { "silent" },
        "bytes_received": received.len(),
        "frame_decoded": matches!(decoded, Some(Ok(_))),
        "frame_type": frame_type,
        "timeout_seconds": timeout,
    });
    println!("{}", payload);
    std::process::exit(if status_ok { 0 } else { 1 });
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(cfg) = config {
        if let Some(ref file) = cfg.logging.file {
            if let Ok(f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
            {
                let mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
                let write_mutex = mutex.clone();

                // When stdout is a terminal, mirror log lines to the console
                // as well as the file.
                let is_tty = atty::is(atty::Stream::Stdout);

                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());

                    if let Ok(mut guard) = write_mutex.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }

                    if is_tty {
                        writeln!(fmt, "{}", line)
                    } else {
                        Ok(())
                    }
                });
            } else {
                builder.format(|fmt, record| {
                    writeln!(
                        fmt,
                        "{} [{}] {}",
                        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                        record.level(),
                        record.args()
                    )
                });
            }
        } else {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
