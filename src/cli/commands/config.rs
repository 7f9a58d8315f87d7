//! Config command implementation
//!
//! Prints the merged configuration (defaults, config files, environment).

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::Output;
use crate::config::RunnerConfig;

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Print as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Document<'a> {
    runner: &'a RunnerConfig,
}

pub fn execute(args: ConfigArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = RunnerConfig::load(config_path)?;
    let document = Document { runner: &config };

    let rendered = if args.json {
        serde_json::to_string_pretty(&document).context("Failed to serialize config as JSON")?
    } else {
        toml::to_string_pretty(&document).context("Failed to serialize config as TOML")?
    };
    output.plain(rendered.trim_end());

    if config.max_parallel == 0 {
        output.verbose(&format!(
            "max_parallel = 0 resolves to {} workers on this machine",
            config.resolved_max_parallel()
        ));
    }
    Ok(())
}
