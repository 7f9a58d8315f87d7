use anyhow::{Context, Result, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const ENV_PREFIX: &str = "PARALLEL_RUNNER_";

/// Settings used to build a [`Runner`](crate::parallel::Runner)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum number of worker threads (0 = derive from CPU cores)
    pub max_parallel: usize,
    /// Percentage of CPU cores to use when `max_parallel` is 0 (1-100)
    pub thread_percentage: u8,
    /// Number of tasks that can be queued before submission blocks
    pub capacity: usize,
    /// Cancel the runner on the first task error
    pub fail_fast: bool,
    /// Delay before the finish notification fires when no task ever started
    pub finish_grace_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 0,
            thread_percentage: 75,
            capacity: 64,
            fail_fast: false,
            finish_grace_ms: 1000,
        }
    }
}

impl RunnerConfig {
    /// Load the merged configuration and validate it.
    pub fn load(custom_config: Option<&str>) -> Result<Self> {
        let figment = Self::figment(custom_config)?;
        let config: RunnerConfig = figment
            .extract_inner("runner")
            .context("Failed to parse runner configuration")?;
        config.validate()?;

        tracing::debug!(?config, "Loaded runner configuration");
        Ok(config)
    }

    /// Build the provider chain without extracting it.
    pub fn figment(custom_config: Option<&str>) -> Result<Figment> {
        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG)) // Embedded defaults
            .merge(Toml::file(Self::user_config_path()))
            .merge(Toml::file("parallel-runner.toml"));

        if let Some(custom_path) = custom_config {
            let path = Path::new(custom_path);
            ensure!(path.is_file(), "Config file not found: {}", custom_path);
            tracing::trace!("Merging custom config {}", custom_path);

            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        // Environment variables always have highest priority
        let env = Env::prefixed(ENV_PREFIX)
            .map(|key| format!("runner.{}", key.as_str().to_ascii_lowercase()).into());
        Ok(figment.merge(env))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=100).contains(&self.thread_percentage),
            "thread_percentage must be between 1 and 100, got {}",
            self.thread_percentage
        );
        Ok(())
    }

    /// Worker count to start with, resolving `max_parallel = 0` from CPU cores
    pub fn resolved_max_parallel(&self) -> usize {
        if self.max_parallel > 0 {
            return self.max_parallel;
        }
        let available_cores = num_cpus::get();
        std::cmp::max(1, (available_cores * self.thread_percentage as usize) / 100)
    }

    pub fn finish_grace_period(&self) -> Duration {
        Duration::from_millis(self.finish_grace_ms)
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/.config/parallel-runner/config.toml", home),
            Err(_) => "~/.config/parallel-runner/config.toml".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let embedded: RunnerConfig = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .extract_inner("runner")
            .unwrap();
        assert_eq!(embedded, RunnerConfig::default());
    }

    #[test]
    fn test_env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("PARALLEL_RUNNER_MAX_PARALLEL", "6");
            jail.set_env("PARALLEL_RUNNER_FAIL_FAST", "true");

            let config = RunnerConfig::load(None).expect("config should load");
            assert_eq!(config.max_parallel, 6);
            assert!(config.fail_fast);
            assert_eq!(config.capacity, 64);
            Ok(())
        });
    }

    #[test]
    fn test_repository_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "parallel-runner.toml",
                "[runner]\ncapacity = 5\nfinish_grace_ms = 20\n",
            )?;

            let config = RunnerConfig::load(None).expect("config should load");
            assert_eq!(config.capacity, 5);
            assert_eq!(config.finish_grace_period(), Duration::from_millis(20));
            Ok(())
        });
    }

    #[test]
    fn test_custom_json_config() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.json", r#"{ "runner": { "max_parallel": 3 } }"#)?;

            let config = RunnerConfig::load(Some("custom.json")).expect("config should load");
            assert_eq!(config.max_parallel, 3);
            Ok(())
        });
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        let result = RunnerConfig::load(Some("does-not-exist.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_thread_percentage() {
        let config = RunnerConfig {
            thread_percentage: 0,
            ..RunnerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolved_max_parallel() {
        let explicit = RunnerConfig {
            max_parallel: 12,
            ..RunnerConfig::default()
        };
        assert_eq!(explicit.resolved_max_parallel(), 12);

        let auto = RunnerConfig {
            thread_percentage: 1,
            ..RunnerConfig::default()
        };
        assert!(auto.resolved_max_parallel() >= 1);
    }
}
