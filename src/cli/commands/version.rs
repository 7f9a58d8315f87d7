//! Version command implementation

use anyhow::Result;
use clap::Args;

use crate::cli::Output;

#[derive(Args, Debug, Default)]
pub struct VersionArgs {}

pub fn execute(_args: VersionArgs, output: &Output) -> Result<()> {
    output.plain(&format!("{} {}", crate::PKG_NAME, crate::VERSION));
    output.verbose(crate::PKG_DESCRIPTION);
    output.verbose(&format!("CPU cores available: {}", num_cpus::get()));
    Ok(())
}
