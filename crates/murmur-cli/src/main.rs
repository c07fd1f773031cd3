//! Murmur terminal client.
//!
//! # Usage
//!
//! ```bash
//! murmur --url ws://localhost:3000/ws --user-id u1 --user-name Alice --room general
//! ```
//!
//! The token comes from `--token` or `MURMUR_TOKEN`.

use clap::Parser;
use murmur_cli::runtime::{Runtime, RuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Murmur realtime chat client
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(about = "Terminal client for the Murmur chat backend")]
#[command(version)]
struct Args {
    /// WebSocket endpoint of the backend
    #[arg(short, long, default_value = "ws://localhost:3000/ws")]
    url: String,

    /// Bearer token presented on every handshake
    #[arg(short, long, env = "MURMUR_TOKEN", hide_env_values = true)]
    token: String,

    /// Id of the signed-in user
    #[arg(long)]
    user_id: String,

    /// Display name of the signed-in user
    #[arg(long)]
    user_name: Option<String>,

    /// Room to join on startup
    #[arg(short, long)]
    room: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so they do not interleave with the conversation.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = RuntimeConfig {
        url: args.url,
        token: args.token,
        user_name: args.user_name.unwrap_or_else(|| args.user_id.clone()),
        user_id: args.user_id,
        room: args.room,
    };

    tracing::info!(url = %config.url, user = %config.user_id, "murmur starting");
    Runtime::new(config).run().await?;

    Ok(())
}
