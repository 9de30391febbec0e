mod commands;
mod wiring;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use modcheck_config::{ConfigError, RunConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit code for a run that failed or a contract that did not hold
const EXIT_FAILED: u8 = 1;
/// Exit code for unusable configuration
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "modcheck")]
#[command(about = "Provision a terraform module, verify what it created, tear it down")]
#[command(long_about = None)]
struct Cli {
    /// Config file (defaults to modcheck.yaml discovery)
    #[arg(short, long, global = true, env = "MODCHECK_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the module, verify the resource, destroy it
    Run(RunArgs),
    /// Print generated resource names
    Name {
        /// How many names to generate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
    /// Cut the identifier out of a raw output value
    Extract {
        /// Raw output value, e.g. a repository URL
        raw: String,
        /// Override the configured delimiter
        #[arg(short, long)]
        delimiter: Option<String>,
        /// Override the configured segment index
        #[arg(short, long)]
        segment: Option<usize>,
    },
    /// Show the effective configuration
    Config,
    /// Show version
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Module directory
    #[arg(short, long)]
    pub module_dir: Option<PathBuf>,

    /// Provider region
    #[arg(short, long)]
    pub region: Option<String>,

    /// AWS profile for verification
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Reuse a token instead of generating one
    #[arg(long)]
    pub token: Option<String>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILED)
            }
        }
    }
}

/// Logs go to stderr; stdout carries command output
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.as_deref();

    let passed = match cli.command {
        // Version does not need a config file
        Commands::Version => {
            println!("modcheck {}", env!("CARGO_PKG_VERSION"));
            true
        }
        Commands::Run(args) => {
            let (config, _) = load_config(config_path)?;
            commands::run::handle(config, args).await?
        }
        Commands::Name { count } => {
            let (config, _) = load_config(config_path)?;
            commands::name::handle(&config, count)
        }
        Commands::Extract {
            raw,
            delimiter,
            segment,
        } => {
            let (config, _) = load_config(config_path)?;
            commands::extract::handle(&config, &raw, delimiter, segment)
        }
        Commands::Config => {
            let (config, source) = load_config(config_path)?;
            commands::config::handle(&config, source.as_deref())?
        }
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    })
}

fn load_config(path: Option<&Path>) -> Result<(RunConfig, Option<PathBuf>), ConfigError> {
    let (config, source) = modcheck_config::load_config(path)?;
    tracing::debug!(
        "Config: {}",
        source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    );
    Ok((config, source))
}
