//! Relay Client Binary
//!
//! Reads lines from stdin and sends each as one message; prints every
//! relayed message on its own line.
//!
//! ## Usage
//!
//! ```bash
//! relay-client --server 127.0.0.1:8001
//! relay-client --server chat.example.net:8001 --profile rsa
//! ```

use clap::Parser;
use relay_client::{ClientConfig, ClientError, RelayClient};
use relay_protocol::{CipherProfile, DEFAULT_MAX_FRAME_LEN};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Relay Client - console chat over a cipher-relay server
#[derive(Parser, Debug)]
#[command(name = "relay-client")]
#[command(version)]
#[command(about = "Console client for the encrypted chat relay", long_about = None)]
struct Args {
    /// Server address (host:port)
    #[arg(short = 's', long, default_value = "127.0.0.1:8001")]
    server: String,

    /// Cipher profile (plain, rsa, layered); must match the server
    #[arg(long, default_value_t = CipherProfile::Layered)]
    profile: CipherProfile,

    /// Smallest prime for the client keypair
    #[arg(long, default_value_t = 17)]
    prime_min: u64,

    /// Largest prime for the client keypair
    #[arg(long, default_value_t = 97)]
    prime_max: u64,

    /// Longest accepted line in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    /// Configuration file path
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    /// Generate sample configuration file
    #[arg(long)]
    generate_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(path) = args.generate_config {
        ClientConfig::default().save_to_file(&path)?;
        println!("Generated sample configuration at: {}", path.display());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => ClientConfig::load_from_file(path)?,
        None => ClientConfig::builder()
            .server_address(&args.server)
            .profile(args.profile)
            .prime_range(args.prime_min, args.prime_max)
            .max_frame_len(args.max_frame_len)
            .log_level(&args.log_level)
            .build()?,
    };

    // Logs go to stderr so stdout carries only chat lines
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let connection = RelayClient::connect(&config).await?;
    let (mut sender, mut receiver) = connection.into_split();

    let mut printer = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(Some(line)) => println!("{}", line),
                Ok(None) => {
                    info!("Server closed the connection");
                    return Ok(());
                }
                Err(e) if e.is_disconnect() => {
                    info!("Connection lost: {}", e);
                    return Ok(());
                }
                Err(e) => return Err::<(), ClientError>(e),
            }
        }
    });

    // A plain thread, so a pending stdin read never holds up runtime shutdown
    let (line_tx, mut lines) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let finished = loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => sender.send(&line).await?,
                None => {
                    debug!("stdin closed");
                    break None;
                }
            },
            joined = &mut printer => break Some(joined),
        }
    };

    sender.close().await.ok();
    match finished {
        Some(joined) => joined??,
        None => printer.abort(),
    }
    Ok(())
}
