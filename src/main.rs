use anyhow::Result;
use clap::Parser;
use parallel_runner::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
