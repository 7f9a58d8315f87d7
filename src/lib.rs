//! # parallel-runner - bounded, cancellable parallel task execution
//!
//! A producer/consumer worker pool for blocking work:
//!
//! - **Bounded queue**: producers block when the queue is full
//! - **Per-task errors**: failures are collected by task sequence number
//! - **Fail-fast or continue**: the first error can cancel the whole runner
//! - **Dynamic scaling**: grow or shrink the pool while it is running
//! - **Quiescence signal**: one-shot notification once all work drained
//!
//! ## Library Usage
//!
//! ```rust
//! use parallel_runner::parallel::Runner;
//!
//! let runner = Runner::new(2, 4, true);
//! runner.add_task(|worker_id| {
//!     println!("hello from worker {}", worker_id);
//!     Ok(())
//! })?;
//! runner.done();
//! runner.run();
//! assert!(runner.errors().is_empty());
//! # Ok::<(), parallel_runner::parallel::RunnerError>(())
//! ```
//!
//! ## Configuration
//!
//! Defaults can be loaded from `parallel-runner.toml` and
//! `PARALLEL_RUNNER_*` environment variables, see [`config::RunnerConfig`].

pub mod cli;
pub mod config;
pub mod parallel;

pub use config::RunnerConfig;
pub use parallel::{Runner, RunnerError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
