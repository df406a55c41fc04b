//! Ronnyx CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP gateway
//! - `chat`    — Interactive chat or single-message mode
//! - `tools`   — List the tools the assistant can call
//! - `doctor`  — Check configuration and credentials

use clap::{Parser, Subcommand};
use ronnyx_core::event::EventBus;
use std::sync::Arc;

mod commands;

#[derive(Parser)]
#[command(
    name = "ronnyx",
    about = "Ronnyx — a conversational assistant for GitHub and Notion",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long, env = "RONNYX_PORT")]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Chat with the assistant from the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session to continue
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// List the registered tools
    Tools,

    /// Check configuration, credentials and the model endpoint
    Doctor,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Log every domain event at debug level.
fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match serde_json::to_string(event.as_ref()) {
                Ok(payload) => tracing::debug!(event = event.kind(), %payload, "Domain event"),
                Err(e) => tracing::warn!(event = event.kind(), error = %e, "Unserializable event"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let events = Arc::new(EventBus::default());
    if cli.verbose {
        spawn_event_logger(&events);
    }

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(port, host, events).await?,
        Commands::Chat { message, session } => {
            commands::chat::run(message, session, events).await?
        }
        Commands::Tools => commands::tools::run()?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
