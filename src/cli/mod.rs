//! Command-line interface for the runner
//!
//! A small driver around [`crate::parallel::Runner`]: it pushes a synthetic
//! workload through the pool, and inspects the resolved configuration.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
