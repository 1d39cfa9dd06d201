//! ssemon - command-line monitor for Server-Sent Events streams
//!
//! Connects to `{server}/events`, renders `message`, `sensor-data` and `end`
//! events with timestamps, and stops on `end` or on a connection error.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ssemon_client::{ChannelHandler, DispatchTable, SseClient, StreamController};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat, TerminalDisplay};

#[derive(Parser)]
#[command(name = "ssemon")]
#[command(author, version, about = "Server-Sent Events stream monitor")]
#[command(propagate_version = true)]
struct Cli {
    /// Server URL [default: http://localhost:8080]
    #[arg(short, long, env = "SSEMON_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "SSEMON_CONFIG")]
    config: Option<PathBuf>,

    /// Output format [default: text]
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Extra event channel to render (repeatable)
    #[arg(long = "channel", value_name = "NAME")]
    channels: Vec<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start receiving immediately and follow the stream until it ends
    Watch,

    /// Interactive console with start/stop controls
    Console,

    /// Check that the server is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        cli.server.as_deref(),
        cli.output,
        cli.no_color,
        &cli.channels,
    )?;

    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);
    let client = create_client(&merged)?;

    match cli.command {
        Commands::Watch => {
            let mut controller = create_controller(client, &merged, &ctx);
            commands::watch(&mut controller, &ctx).await?;
        }

        Commands::Console => {
            let mut controller = create_controller(client, &merged, &ctx);
            commands::console(&mut controller, &ctx).await?;
        }

        Commands::Health => {
            commands::health(&client, &ctx).await?;
        }
    }

    Ok(())
}

/// Create an SSE client for the configured server
fn create_client(config: &MergedConfig) -> Result<SseClient> {
    SseClient::with_connect_timeout(&config.server, config.connect_timeout)
        .with_context(|| format!("Failed to create client for {}", config.server))
}

/// Controller rendering the default channels plus any configured extras
fn create_controller(
    client: SseClient,
    config: &MergedConfig,
    ctx: &OutputContext,
) -> StreamController<SseClient, TerminalDisplay> {
    let mut dispatch = DispatchTable::default();
    for channel in &config.channels {
        if dispatch.lookup(channel).is_none() {
            dispatch.register(channel.as_str(), ChannelHandler::Render);
        }
    }
    tracing::debug!("Listening on channels: {:?}", dispatch.channels());

    StreamController::with_dispatch(client, ctx.display(), dispatch)
}
