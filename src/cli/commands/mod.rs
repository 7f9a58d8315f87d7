//! Command implementations for the runner CLI
//!
//! Each command lives in its own module with an `Args` struct and an
//! `execute` function.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cli::Output;

pub mod config;
pub mod run;
pub mod version;

#[derive(Parser)]
#[command(
    name = "parallel-runner",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bounded, cancellable parallel task runner",
    long_about = "Drives a synthetic workload through a bounded worker pool to exercise \
                  fail-fast, cancellation and dynamic scaling behaviour."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a synthetic workload through the runner
    Run(run::RunArgs),
    /// Show the resolved runner configuration
    Config(config::ConfigArgs),
    /// Show version information
    Version(version::VersionArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Run(args)) => run::execute(args, self.config.as_deref(), &output),
            Some(Commands::Config(args)) => {
                config::execute(args, self.config.as_deref(), &output)
            }
            Some(Commands::Version(args)) => version::execute(args, &output),
            None => {
                output.info("Run 'parallel-runner --help' for usage information");
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(verbose > 1)
        .with_writer(std::io::stderr)
        .init();
}
