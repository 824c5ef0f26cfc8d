//! Ostinato CLI: the operator entry point.
//!
//! Commands:
//! - `config`      — Show, validate, or initialize configuration
//! - `call`        — Run one agent call with the configured client
//! - `transcript`  — Inspect or compact a saved conversation context

use clap::{ArgGroup, Parser, Subcommand};
use ostinato_config::LoggingConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ostinato",
    about = "Ostinato — tool-calling agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.ostinato/config.toml)
    #[arg(short, long, global = true, env = "OSTINATO_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run a single agent call and print its output
    Call {
        /// Call input; parsed as JSON when possible, otherwise sent as text
        input: String,

        /// Prompt template rendered against the input
        #[arg(short, long)]
        template: Option<String>,

        /// Print the whole result (usage, iterations) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Saved transcript tools
    Transcript {
        #[command(subcommand)]
        action: TranscriptAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Check the configuration and report problems
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

#[derive(Subcommand)]
enum TranscriptAction {
    /// Iteration count, estimated tokens and budget utilization
    Stats {
        file: PathBuf,

        /// Budget to report utilization against (defaults to config)
        #[arg(long)]
        budget: Option<u64>,

        /// Estimate from message text instead of a flat per-message cost
        #[arg(long)]
        chars: bool,
    },

    /// Drop or summarize old iterations and write the result as JSON
    #[command(group(ArgGroup::new("rule").required(true).args(["keep_last", "max_age"])))]
    Compact {
        file: PathBuf,

        /// Keep the N most recent iterations
        #[arg(long)]
        keep_last: Option<usize>,

        /// Drop iterations older than SECS
        #[arg(long, value_name = "SECS")]
        max_age: Option<u64>,

        /// Collapse older iterations into a summary instead of dropping them
        #[arg(long, requires = "keep_last")]
        summarize: bool,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(commands::default_config_path);

    match cli.command {
        Commands::Config { action } => {
            init_logging(cli.verbose, &LoggingConfig::default());
            match action {
                ConfigAction::Show => commands::config_cmd::show(&path)?,
                ConfigAction::Validate => commands::config_cmd::validate(&path)?,
                ConfigAction::Init { force } => commands::config_cmd::init(&path, force)?,
                ConfigAction::Path => println!("{}", path.display()),
            }
        }
        Commands::Call { input, template, json } => {
            let config = commands::load_config(&path)?;
            init_logging(cli.verbose, &config.logging);
            commands::call::run(&config, &input, template, json).await?;
        }
        Commands::Transcript { action } => {
            let config = commands::load_config(&path)?;
            init_logging(cli.verbose, &config.logging);
            match action {
                TranscriptAction::Stats { file, budget, chars } => {
                    commands::transcript::stats(&config, &file, budget, chars)?
                }
                TranscriptAction::Compact {
                    file,
                    keep_last,
                    max_age,
                    summarize,
                    output,
                } => commands::transcript::compact(&file, keep_last, max_age, summarize, output.as_deref())?,
            }
        }
    }

    Ok(())
}
