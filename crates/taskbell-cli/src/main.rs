use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "taskbell-cli", version, about = "Taskbell CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a task snapshot file
    Check {
        /// Path to the task snapshot (JSON array of tasks)
        file: PathBuf,
    },
    /// Run the engine against a task snapshot and print notifications
    Watch {
        /// Path to the task snapshot (JSON array of tasks)
        file: PathBuf,
        /// Optional TOML file with [engine] and [notifications] sections
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop after this many seconds (default: run until interrupted)
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check { file } => commands::check::run(&file),
        Commands::Watch {
            file,
            config,
            duration_secs,
        } => commands::watch::run(&file, config.as_deref(), duration_secs),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
