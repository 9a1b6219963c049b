use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use hotspot_scheduler::app::{self, InputSource, OutputFormat};
use hotspot_scheduler::config::{self, Config};
use hotspot_scheduler::sensor::SensorScript;

#[derive(Parser)]
#[command(name = "hotspot-scheduler")]
#[command(version)]
#[command(about = "Turns hotspot press/release events into activation events")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read configuration from this file instead of the user config
    #[arg(short, long, env = "HOTSPOT_SCHEDULER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the dwell time in milliseconds
    #[arg(short = 't', long)]
    activation_time_ms: Option<u64>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read sensor commands (`press 1`, `release 1`, `wait 200`) from stdin
    Listen,
    /// Replay a sensor script file
    Replay {
        /// Path to the script
        script: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = match &cli.config {
        Some(path) => {
            let config = config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            (config, None)
        }
        None => match config::load_config() {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };
    if let Some(ms) = cli.activation_time_ms {
        config.activation_time_ms = ms;
    }

    init_tracing(&config.log_filter);
    if let Some(e) = load_error {
        warn!(error = %e, "could not load config, using defaults");
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command.unwrap_or(Commands::Listen) {
        Commands::Listen => {
            app::run(&config, InputSource::Stdin, format).await?;
        }
        Commands::Replay { script } => {
            let script = SensorScript::load(&script)?;
            app::run(&config, InputSource::Script(script), format).await?;
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
