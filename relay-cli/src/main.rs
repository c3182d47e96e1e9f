//! Relay CLI - Command line interface for Relay
//!
//! Reviews GitHub pull requests with a team of cooperating agents.

mod commands;
mod reporter;

use clap::{Parser, Subcommand};
use relay_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ReviewArgs, SecretsArgs};

/// Relay: multi-agent pull request review
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use ASCII markers instead of emoji
    #[arg(long, global = true, env = "RELAY_NO_EMOJI")]
    no_emoji: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Review a pull request and post the result
    #[command(visible_alias = "r")]
    Review(ReviewArgs),

    /// Show current configuration
    Config,

    /// Manage credentials
    Secrets(SecretsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Review(args)) => {
            args.execute(cli.verbose, cli.no_emoji).await?;
        }
        Some(Commands::Config) => {
            let config = Config::load_with_overrides(None, None, false)?;
            println!("Relay Configuration");
            println!("===================");
            println!();
            print!("{}", config.to_toml()?);
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        Some(Commands::Secrets(args)) => {
            args.execute()?;
        }
        None => {
            println!("Relay - Multi-agent pull request review");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
