//! reviewscribe: batch screencast review from the command line.

mod commands;
mod estimate;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{config::ConfigArgs, review::ReviewArgs, transcribe::TranscribeArgs};

/// Exit code for a user interrupt, matching shell convention.
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(
    name = "reviewscribe",
    version,
    about = "Automated video review: transcription, semantic analysis, visual findings"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging (RUST_LOG overrides).
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review one or more screencast videos.
    Review(ReviewArgs),
    /// Transcribe a video to text without further analysis.
    Transcribe(TranscribeArgs),
    /// Show or initialize the configuration.
    Config(ConfigArgs),
    /// Print the version.
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Review(args) => commands::review::run(args, cli.verbose).await,
        Command::Transcribe(args) => commands::transcribe::run(args).await,
        Command::Config(args) => commands::config::run(args),
        Command::Version => {
            println!("reviewscribe {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}
