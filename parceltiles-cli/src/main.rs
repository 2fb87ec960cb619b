//! Parceltiles CLI - Command-line interface
//!
//! Provides the `build` (bulk pyramid pre-computation) and `serve`
//! (HTTP tile delivery) entry points over the parceltiles library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::build::BuildArgs;
use commands::serve::ServeArgs;
use error::CliError;
use parceltiles::logging::{default_log_dir, default_log_file, init_logging};

#[derive(Parser)]
#[command(name = "parceltiles")]
#[command(version = parceltiles::VERSION)]
#[command(about = "Vector tile pipeline for the parcel explorer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pre-compute a tile pyramid for a bounding box and zoom range
    Build(BuildArgs),
    /// Serve tiles over HTTP with a cache-first read path
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logging_guard = match init_logging(default_log_dir(), default_log_file()) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e).exit(),
    };

    let result = match cli.command {
        Command::Build(args) => commands::build::run(args).await,
        Command::Serve(args) => commands::serve::run(args).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}
