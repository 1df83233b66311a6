use clap::Parser;
use log::{error, info};
use server::{GateConfig, Server};
use std::fs;

/// Main-method of the application.
/// Parses command-line arguments and configuration, then runs the gate until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "25565")]
        port: u16,
        /// JSON configuration file
        #[clap(short, long)]
        config: Option<String>,
        /// Verification timeout in milliseconds
        #[clap(long)]
        timeout_ms: Option<u64>,
        /// Compression threshold in bytes, negative disables compression
        #[clap(long, allow_hyphen_values = true)]
        compression_threshold: Option<i32>,
        /// Logins released from the queue per poll
        #[clap(long)]
        max_queue_polls: Option<usize>,
    }

    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GateConfig::from_json(&fs::read_to_string(path)?)?,
        None => GateConfig::default(),
    };
    if let Some(timeout_ms) = args.timeout_ms {
        config.verification_timeout_ms = timeout_ms;
    }
    if let Some(threshold) = args.compression_threshold {
        config.compression_threshold = threshold;
    }
    if let Some(polls) = args.max_queue_polls {
        config.max_queue_polls = polls;
    }
    let config = config.validated();
    info!("Gate configuration: {}", serde_json::to_string(&config)?);

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, config).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            let snapshot = server.gatekeeper().snapshot();
            info!(
                "Received Ctrl+C, shutting down ({} verified, {} blacklisted this run)",
                snapshot.totals.verified, snapshot.totals.blacklisted
            );
        }
    }

    Ok(())
}
