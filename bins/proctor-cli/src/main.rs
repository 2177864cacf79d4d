mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "proctor")]
#[command(about = "Proctor CLI - Grade challenge submissions from the command line", long_about = None)]
struct Cli {
    /// Engine configuration file (defaults to config/engine.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a submission against a challenge
    Run {
        /// Challenge definition (JSON)
        #[arg(short, long)]
        challenge: PathBuf,

        /// Directory holding the student's edited files
        #[arg(short, long)]
        submission: Option<PathBuf>,

        /// Grade a step instead of the whole challenge (1-based)
        #[arg(long)]
        step: Option<usize>,

        /// Override the challenge's language key
        #[arg(short, long)]
        language: Option<String>,

        /// Print the outcome as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Check a challenge definition for authoring problems
    Validate {
        /// Challenge definition (JSON)
        #[arg(short, long)]
        challenge: PathBuf,
    },

    /// Start the Python runtime and report how long it took
    Prewarm,

    /// List supported languages
    Languages,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            challenge,
            submission,
            step,
            language,
            json,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let passed = commands::run_challenge(
                config,
                &challenge,
                submission.as_deref(),
                step,
                language.as_deref(),
                json,
            )
            .await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Validate { challenge } => {
            commands::validate_challenge(&challenge)?;
        }
        Commands::Prewarm => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::prewarm(config).await?;
        }
        Commands::Languages => {
            commands::list_languages();
        }
    }

    Ok(())
}
