//! Coach CLI - Terminal Front End for the Career Coach
//!
//! Streams replies from the career coach API into the terminal and exposes
//! the coach's tools as slash commands.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session against the default server
//! coach-cli
//!
//! # Different server, plain-text replies
//! coach-cli --api-url http://coach.internal:8000 --format plain
//!
//! # One question, then exit
//! coach-cli --once "How do I negotiate a job offer?"
//!
//! # Verbose logging (goes to stderr)
//! RUST_LOG=debug coach-cli
//! ```
//!
//! # Signals
//!
//! - `SIGINT` while a reply streams: cancel the reply
//! - `SIGINT` at the prompt: exit

mod commands;
mod render;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use coach_core::config::{load_config, load_config_from_path, ConfigOverrides};
use coach_core::{FormatPreference, HttpBackend, StreamController};

use repl::Repl;

/// Coach CLI - Streaming chat with the career coach
#[derive(Parser, Debug)]
#[command(name = "coach-cli")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Coach API base URL (overrides config and COACH_API_URL)
    #[arg(short = 'u', long, value_name = "URL")]
    api_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "COACH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reply format (markdown, plain, code)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    format: Option<FormatPreference>,

    /// Disable automatic tool selection
    #[arg(long)]
    no_auto_tools: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "COACH_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Send one message, print the reply and exit
    #[arg(long, value_name = "MESSAGE")]
    once: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.api_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(format) = self.format {
            overrides = overrides.with_format_preference(format);
        }
        if self.no_auto_tools {
            overrides = overrides.with_auto_tool_selection(false);
        }
        overrides
    }
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so they never interleave with the streamed reply.
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("coach_cli={level},coach_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Coach CLI starting");

    let mut config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            load_config_from_path(Some(path.clone()))
        }
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        base_url = %config.server.base_url,
        format = %config.chat.format_preference,
        auto_tools = config.chat.auto_tool_selection,
        source = %config.source(),
        "Configuration loaded"
    );

    let backend = HttpBackend::from_config(&config.server)?;
    let controller = Arc::new(StreamController::new(backend, config.chat));
    let mut repl = Repl::new(controller)?;

    let result = match args.once {
        Some(ref message) => repl.send_once(message).await,
        None => repl.run().await,
    };

    if let Err(ref e) = result {
        error!(error = %e, "Coach CLI stopped with error");
    }
    result
}
