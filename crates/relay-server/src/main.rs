//! Relay Server Binary
//!
//! ## Usage
//!
//! ```bash
//! relay-server --port 8001 --profile layered -p 61 -q 53
//! relay-server --random-primes 17,97
//! relay-server --generate-config relay-server.toml
//! ```

use clap::Parser;
use relay_protocol::{CipherProfile, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT};
use relay_server::{RelayServer, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Relay Server - multi-party encrypted chat relay
#[derive(Parser, Debug)]
#[command(name = "relay-server")]
#[command(version)]
#[command(about = "Encrypted multi-party chat relay", long_about = None)]
struct Args {
    /// Bind address
    #[arg(short = 'a', long, default_value = "0.0.0.0")]
    address: String,

    /// Bind port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Cipher profile (plain, rsa, layered)
    #[arg(long, default_value_t = CipherProfile::Layered)]
    profile: CipherProfile,

    /// First RSA prime
    #[arg(short = 'p', default_value_t = 61)]
    p: u64,

    /// Second RSA prime
    #[arg(short = 'q', default_value_t = 53)]
    q: u64,

    /// Draw both RSA primes from MIN,MAX instead of -p/-q
    #[arg(long, value_name = "MIN,MAX", value_parser = parse_range)]
    random_primes: Option<(u64, u64)>,

    /// Longest accepted line in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    /// Configuration file path
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Generate sample configuration file
    #[arg(long)]
    generate_config: Option<PathBuf>,
}

fn parse_range(s: &str) -> Result<(u64, u64), String> {
    let (min, max) = s
        .split_once(',')
        .ok_or_else(|| format!("expected MIN,MAX, got {:?}", s))?;
    let min = min.trim().parse().map_err(|e| format!("bad MIN: {}", e))?;
    let max = max.trim().parse().map_err(|e| format!("bad MAX: {}", e))?;
    Ok((min, max))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Handle generate-config option
    if let Some(path) = args.generate_config {
        let config = ServerConfig::default();
        config.save_to_file(&path)?;
        println!("Generated sample configuration at: {}", path.display());
        return Ok(());
    }

    // Load or build configuration
    let config = if let Some(config_path) = &args.config {
        ServerConfig::load_from_file(config_path)?
    } else {
        let builder = ServerConfig::builder()
            .bind_address(&args.address)
            .bind_port(args.port)
            .profile(args.profile)
            .max_frame_len(args.max_frame_len)
            .log_level(&args.log_level);
        match args.random_primes {
            Some((min, max)) => builder.random_rsa_primes(min, max),
            None => builder.rsa_primes(args.p, args.q),
        }
        .build()?
    };

    // Initialize logging
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    if let Some(config_path) = &args.config {
        info!("Loaded configuration from: {}", config_path.display());
    }
    info!("Configuration:");
    info!("  Bind: {}:{}", config.bind_address, config.bind_port);
    info!("  Profile: {}", config.profile);
    info!("  RSA primes: {:?}", config.rsa_primes);
    info!("  Max frame: {} bytes", config.max_frame_len);

    let server = Arc::new(RelayServer::bind(config)?);

    // Handle Ctrl+C
    let signal_server = Arc::clone(&server);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    // Run the server
    match server.serve().await {
        Ok(()) => {
            info!("Server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
