//! Lifevest CLI - back up and restore Docker Swarm configuration

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use lifevest_swarm::ExtractionConfig;
use lifevest_swarm::extract::{DEFAULT_MAX_ATTEMPTS, HELPER_IMAGE, HELPER_SERVICE_NAME};

mod adapters;
mod error;
mod exit_codes;
mod logging;
mod orchestrator;

use error::{CliError, Result};
use orchestrator::{Invocation, Orchestrator, default_destination};

const RECIPES: &str = "\
Examples:
  Back up a swarm to a timestamped folder:
    lifevest -s tcp://manager:2375

  Back up a swarm to a chosen folder:
    lifevest -s manager:2375 -d ./swarm-backup

  Restore a folder onto a swarm:
    lifevest -i folder -s ./swarm-backup -o swarm -d manager:2375

  Copy one swarm onto another, with credentials for private images:
    lifevest -s old-manager -o swarm -d new-manager -R registry-credentials.json";

#[derive(Parser, Debug)]
#[command(name = "lifevest")]
#[command(version)]
#[command(about = "Back up and restore Docker Swarm services, configs and secrets", long_about = None)]
#[command(after_help = RECIPES)]
struct Cli {
    /// Where to read from: swarm or folder
    #[arg(short = 'i', long = "input", visible_alias = "in", value_name = "TYPE", default_value = "swarm")]
    input: String,

    /// Swarm manager endpoint or backup folder to read
    #[arg(short = 's', long)]
    source: String,

    /// Where to write to: folder or swarm
    #[arg(short = 'o', long = "output", visible_alias = "out", value_name = "TYPE", default_value = "folder")]
    output: String,

    /// Backup folder or Swarm manager endpoint to write [default: backup-<timestamp>]
    #[arg(short = 'd', long = "destination", visible_alias = "dest")]
    destination: Option<String>,

    /// Registry credentials used when creating services [default: registry-credentials.json if present]
    #[arg(short = 'R', long = "registry-credentials", value_name = "PATH")]
    registry_credentials: Option<PathBuf>,

    /// Increase logging, repeat for more
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Disable logging
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Disable logging and print a JSON summary on success
    #[arg(long)]
    porcelain: bool,

    /// Delay between polls of the secret extraction service
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Number of polls before secret extraction gives up
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Image of the secret extraction service
    #[arg(long, value_name = "IMAGE", default_value = HELPER_IMAGE)]
    helper_image: String,
}

impl Cli {
    fn into_invocation(self) -> Invocation {
        let default_destination_used = self.destination.is_none();
        let destination = self
            .destination
            .unwrap_or_else(|| default_destination(chrono::Utc::now()));

        Invocation {
            input: self.input,
            source: self.source,
            output: self.output,
            destination,
            default_destination: default_destination_used,
            registry_credentials: self.registry_credentials,
            extraction: ExtractionConfig {
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                max_attempts: self.max_attempts,
                helper_image: self.helper_image,
                helper_name: HELPER_SERVICE_NAME.to_string(),
            },
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let porcelain = cli.porcelain;
    let invocation = cli.into_invocation();
    tracing::trace!("{:?}", invocation);

    let orchestrator = Orchestrator::new(&invocation)?;
    let summary = orchestrator.run(&invocation).await?;

    if porcelain {
        let line = serde_json::to_string(&summary).map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", line);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too
            let _ = err.print();
            return ExitCode::from(if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            });
        }
    };
    logging::init(logging::Verbosity::from_flags(cli.verbose, cli.quiet, cli.porcelain));

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}
