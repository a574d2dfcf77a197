//! Talon CLI - Command-line interface for the Talon engine

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{run, validate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "talon")]
#[command(about = "Pooled shoot-em-up simulation, run from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a stage headless and report the outcome
    Run {
        /// Path to a stage TOML file
        stage: String,

        /// Template TOML file or directory of them
        #[arg(long, default_value = "templates")]
        templates: String,

        /// Simulated seconds before giving up
        #[arg(long, default_value = "120")]
        duration: f64,

        /// Fixed steps per second
        #[arg(long, default_value = "60")]
        rate: f64,

        /// Checkpoint restarts allowed after the players go down
        #[arg(long, default_value = "0")]
        retries: u32,

        /// Print every simulation event
        #[arg(long)]
        events: bool,

        /// Pace the run at wall-clock speed instead of flat out
        #[arg(long)]
        realtime: bool,
    },

    /// Validate templates and a stage file against each other
    Validate {
        /// Path to a stage TOML file
        stage: String,

        /// Template TOML file or directory of them
        #[arg(long, default_value = "templates")]
        templates: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            stage,
            templates,
            duration,
            rate,
            retries,
            events,
            realtime,
        } => run::run(run::RunArgs {
            stage,
            templates,
            duration,
            rate,
            retries,
            events,
            realtime,
        }),
        Commands::Validate { stage, templates } => validate::run(&stage, &templates),
    }
}
