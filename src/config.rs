use config::{ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

use crate::engine::DEFAULT_MAX_CONCURRENT_CHECKS;
use crate::error::{AppError, AppResult};
use crate::sources::node::DEFAULT_MAX_BALANCE_PAGES;

const ENV_PREFIX: &str = "BALCHECK";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub aggregator_url: String,
    pub bind_address: String,
    pub http_timeout_secs: u64,
    pub max_concurrent_checks: usize,
    pub max_balance_pages: usize,
    pub trigger_rate_per_minute: u32,
    pub run_retention_secs: u64,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aggregator_url: "https://api.emeris.com".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            http_timeout_secs: 30,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            max_balance_pages: DEFAULT_MAX_BALANCE_PAGES,
            trigger_rate_per_minute: 30,
            run_retention_secs: 3600,
            log_json: false,
        }
    }
}

impl Config {
    /// Defaults overridden by `BALCHECK_*` variables, then validated.
    pub fn from_env() -> AppResult<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    /// Like `from_env` without validation, for callers that layer further
    /// overrides on top and validate once at the end.
    pub fn load() -> AppResult<Self> {
        Ok(Self::build(Environment::with_prefix(ENV_PREFIX))?)
    }

    fn from_environment(environment: Environment) -> AppResult<Self> {
        let config = Self::build(environment)?;
        config.validate()?;
        Ok(config)
    }

    fn build(environment: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        config::Config::builder()
            .set_default("aggregator_url", defaults.aggregator_url)?
            .set_default("bind_address", defaults.bind_address)?
            .set_default("http_timeout_secs", defaults.http_timeout_secs as i64)?
            .set_default("max_concurrent_checks", defaults.max_concurrent_checks as i64)?
            .set_default("max_balance_pages", defaults.max_balance_pages as i64)?
            .set_default("trigger_rate_per_minute", defaults.trigger_rate_per_minute as i64)?
            .set_default("run_retention_secs", defaults.run_retention_secs as i64)?
            .set_default("log_json", defaults.log_json)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> AppResult<()> {
        let url = reqwest::Url::parse(&self.aggregator_url).map_err(|e| {
            AppError::Config(format!("aggregator_url {:?}: {}", self.aggregator_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "aggregator_url must be http(s), got {}",
                url.scheme()
            )));
        }

        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("http_timeout_secs must be positive".to_string()));
        }
        if self.max_concurrent_checks == 0 {
            return Err(AppError::Config(
                "max_concurrent_checks must be positive".to_string(),
            ));
        }
        if self.max_balance_pages == 0 {
            return Err(AppError::Config("max_balance_pages must be positive".to_string()));
        }
        if self.trigger_rate_per_minute == 0 {
            return Err(AppError::Config(
                "trigger_rate_per_minute must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn run_retention(&self) -> Duration {
        Duration::from_secs(self.run_retention_secs)
    }
}
