//! # envgate
//!
//! Command-line interface for envgate.
//!
//! Lets an operator (or an agent host's shell scripts) ask the policy layer
//! before acting and review what happened afterwards:
//! - `envgate check command|path|write|delete|network|workdir` — validate one intent
//! - `envgate record success|failure` — report the result of an executed action
//! - `envgate stats` / `envgate report` / `envgate tail` — read the feedback journal
//! - `envgate constraints` / `envgate environments` — inspect the configuration

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Context;

/// envgate — environment policy checks and outcome feedback for agents.
#[derive(Parser)]
#[command(name = "envgate", version, about)]
struct Cli {
    /// Environment config file (YAML, or JSON by extension).
    #[arg(long, global = true, default_value = "config/environments.yaml")]
    config: PathBuf,

    /// Environment to evaluate against.
    #[arg(long = "env", global = true, default_value = "dev")]
    environment: String,

    /// Agent name; selects the feedback journal.
    #[arg(long, global = true, default_value = "agent")]
    agent: String,

    /// Root directory for feedback journals.
    #[arg(long, global = true, default_value = "data/feedback")]
    data_dir: PathBuf,

    /// Validate without recording an outcome.
    #[arg(long, global = true)]
    no_record: bool,

    /// Emit log lines on stderr as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an intended action against the environment policy.
    Check {
        #[command(subcommand)]
        command: commands::check::CheckCommands,
    },
    /// Report the result of an action that was executed.
    Record {
        #[command(subcommand)]
        command: commands::record::RecordCommands,
    },
    /// Print the loaded environment's constraints as JSON.
    Constraints,
    /// Show aggregate statistics from the feedback journal.
    Stats {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the feedback report.
    Report {
        /// Limit the successful-pattern list to the N most frequent.
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show the most recent journal entries.
    Tail {
        /// Number of entries to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
    /// List the environments defined in the config file.
    Environments,
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("envgate=info,envgate_policy=info,envgate_feedback=info"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let ctx = Context {
        config: cli.config,
        environment: cli.environment,
        agent: cli.agent,
        data_dir: cli.data_dir,
        record: !cli.no_record,
    };

    match &cli.command {
        Commands::Check { command } => commands::check::execute(command, &ctx),
        Commands::Record { command } => commands::record::execute(command, &ctx)
            .map(|()| ExitCode::SUCCESS),
        Commands::Constraints => commands::inspect::constraints(&ctx).map(|()| ExitCode::SUCCESS),
        Commands::Environments => {
            commands::inspect::environments(&ctx).map(|()| ExitCode::SUCCESS)
        }
        Commands::Stats { json } => {
            commands::journal::stats(&ctx, *json).map(|()| ExitCode::SUCCESS)
        }
        Commands::Report { top } => {
            commands::journal::report(&ctx, *top).map(|()| ExitCode::SUCCESS)
        }
        Commands::Tail { n } => commands::journal::tail(&ctx, *n).map(|()| ExitCode::SUCCESS),
    }
}
