use clap::{Parser, Subcommand};
use rmu::resolver::ResolveStrategy;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "rmu")]
#[command(about = "Keep Resonite mods up to date from their GitHub releases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every mod in the mods directory and update the stale ones
    Update {
        /// Mods directory (defaults to the configured or Steam one)
        dir: Option<PathBuf>,
        /// Report what would change without writing any file
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// GitHub token for the releases API
        #[arg(long)]
        token: Option<String>,
        /// How to find the newest build: release, tag-feed or fallback
        #[arg(short, long)]
        strategy: Option<ResolveStrategy>,
        /// Number of mods processed at once
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Give up on unfinished mods after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Configure global settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Set the mods directory
    SetPath {
        /// Path to the mods directory
        path: PathBuf,
    },
    /// Store a GitHub token
    SetToken {
        token: String,
    },
    /// Remove the stored GitHub token
    ClearToken,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Update {
            dir,
            dry_run,
            token,
            strategy,
            jobs,
            timeout,
        } => {
            cli::update::run(cli::update::UpdateOptions {
                dir,
                dry_run,
                token,
                strategy,
                jobs,
                timeout,
            })
            .await
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => cli::config::show(),
            ConfigCommands::SetPath { path } => cli::config::set_path(path),
            ConfigCommands::SetToken { token } => cli::config::set_token(token),
            ConfigCommands::ClearToken => cli::config::clear_token(),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\nError: {}", e);
            ExitCode::FAILURE
        }
    }
}
