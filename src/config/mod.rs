//! Configuration management for the runner
//!
//! Runner defaults (worker count, queue capacity, fail-fast policy, finish
//! grace window) are loaded from layered sources with figment:
//!
//! 1. Embedded `default-config.toml` (lowest)
//! 2. User config: `~/.config/parallel-runner/config.toml`
//! 3. Repository config: `parallel-runner.toml`
//! 4. Custom file passed with `--config` (TOML, JSON or YAML)
//! 5. `PARALLEL_RUNNER_*` environment variables (highest)

pub mod core;

pub use core::RunnerConfig;
