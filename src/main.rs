use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use facefolio::cli::{CliHandler, Commands};
use facefolio::version::CURRENT_VERSION;

#[derive(Parser)]
#[command(
    name = "facefolio",
    about = "Browse and organize a face recognition photo library",
    long_about = "facefolio - terminal client for the face recognition photo organizer

OVERVIEW:
  Lists images and people page by page, assigns faces to people, uploads new
  photos and keeps every view in step with the server.

QUICK START:
  facefolio status                      # Check the server connection
  facefolio upload ~/Pictures/party     # Upload a directory of photos
  facefolio unidentified                # Faces nobody has been assigned to
  facefolio person create \"Ada\"         # Add a person
  facefolio image assign <ID> <PERSON>  # Assign an image
  facefolio browse                      # Interactive session",
    version = CURRENT_VERSION,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this settings file instead of the default one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

fn log_directive(verbose: bool) -> &'static str {
    if verbose {
        "facefolio=debug"
    } else {
        "facefolio=info"
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_directive(cli.verbose))
        .with_target(false)
        .with_filter_reloading();
    let filter = subscriber.reload_handle();
    subscriber.init();

    let mut handler = match CliHandler::new(cli.config).await {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // The saved setting is only known once the config has loaded
    if !cli.verbose && handler.config().verbose {
        if let Err(e) = filter.reload(EnvFilter::new(log_directive(true))) {
            tracing::warn!("Could not enable verbose logging: {}", e);
        }
    }

    if let Err(e) = handler.execute(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
