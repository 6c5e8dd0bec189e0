//! Exposes the command line application.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use courier_service::config::{Config, LogFormat};
use courier_service::events::handlers;
use courier_service::metrics;
use courier_service::transport::ReqwestTransport;
use courier_service::{Payload, RequestCoordinator};
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::console::{ConsoleNotifier, ConsoleSession, LoggingActivity};
use crate::logging;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Auto,
    Pretty,
    Simplified,
    Json,
}

impl From<Format> for LogFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Auto => LogFormat::Auto,
            Format::Pretty => LogFormat::Pretty,
            Format::Simplified => LogFormat::Simplified,
            Format::Json => LogFormat::Json,
        }
    }
}

/// Courier commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Issue a GET request.
    Get {
        url: String,
        /// Answer from the response cache if possible.
        #[arg(long)]
        cache: bool,
    },

    /// Issue a POST request with a JSON body.
    Post { url: String, body: Option<String> },

    /// Issue a PUT request with a JSON body.
    Put { url: String, body: Option<String> },

    /// Issue a PATCH request with an optional JSON body.
    Patch { url: String, body: Option<String> },

    /// Issue a DELETE request with an optional JSON body.
    Delete { url: String, body: Option<String> },

    /// Check whether the base URL can be reached.
    Online,
}

/// Command line interface parser.
#[derive(Debug, Parser)]
#[command(name = "courier", version)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// The origin that relative URLs are resolved against.
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<Url>,

    /// Overrides the configured log level.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LevelFilter>,

    /// Overrides the configured log format.
    #[arg(long, global = true, value_enum)]
    format: Option<Format>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Loads the configuration file and applies the overrides from the command line.
    fn config(&self) -> Result<Config> {
        let mut config = Config::get(self.config.as_deref()).context("failed loading config")?;
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.format {
            config.logging.format = format.into();
        }
        Ok(config)
    }
}

fn parse_body(body: Option<&str>) -> Result<Option<Value>> {
    body.map(|body| serde_json::from_str(body).context("request body is not valid JSON"))
        .transpose()
}

fn print_payload(payload: &Payload) -> Result<()> {
    match payload {
        Payload::Text(text) => println!("{text}"),
        Payload::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

async fn run(coordinator: RequestCoordinator, command: Command) -> Result<()> {
    let payload = match command {
        Command::Get { url, cache } => coordinator.get(&url, cache).await,
        Command::Post { url, body } => coordinator.post(&url, parse_body(body.as_deref())?, false).await,
        Command::Put { url, body } => coordinator.put(&url, parse_body(body.as_deref())?, false).await,
        Command::Patch { url, body } => coordinator.patch(&url, parse_body(body.as_deref())?).await,
        Command::Delete { url, body } => coordinator.delete(&url, parse_body(body.as_deref())?).await,
        Command::Online => {
            if coordinator.is_online().await {
                println!("online");
                return Ok(());
            }
            anyhow::bail!("offline");
        }
    };

    print_payload(&payload?)
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;

    logging::init_logging(&config);
    if let Some(ref statsd) = config.metrics.statsd {
        metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("courier")
        .enable_all()
        .build()
        .context("failed to create the runtime")?;

    let transport = ReqwestTransport::new(&config).context("failed to create the HTTP client")?;
    let coordinator = RequestCoordinator::new(&config, Arc::new(transport), runtime.handle().clone())
        .with_activity_indicator(Arc::new(LoggingActivity));

    handlers::install(
        coordinator.events(),
        &config.notifications,
        coordinator.base_url(),
        Arc::new(ConsoleNotifier),
        Arc::new(ConsoleSession),
    );

    runtime.block_on(run(coordinator, cli.command))
}
