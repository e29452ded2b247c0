//! Dispatcher configuration
//!
//! Defines the tunables shared by the regeneration trigger and the script
//! dispatcher: where revalidation requests go, how long a script may run and
//! how regeneration retries behave.

use std::time::Duration;
use thiserror::Error;

/// Default revalidation endpoint of the front-end site
pub const DEFAULT_REVALIDATE_URL: &str = "http://127.0.0.1:3001/api/revalidate";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0}")]
    Invalid(&'static str),
}

/// Side-effect dispatcher configuration
///
/// Every value is read once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Revalidation endpoint; the path goes in the `path` query parameter
    pub revalidate_url: String,

    /// Budget of a single pipeline dispatch
    pub script_timeout: Duration,

    /// Attempts made by `trigger_with_retry`
    pub retry_count: u32,

    /// Pause between two attempts of `trigger_with_retry`
    pub retry_delay: Duration,

    /// Articles per listing page
    pub page_size: u64,

    /// Timeout of one outbound revalidation request
    pub http_timeout: Duration,
}

impl Config {
    /// Creates a configuration pointing at `revalidate_url`, other values
    /// defaulted
    pub fn new(revalidate_url: impl Into<String>) -> Self {
        Self {
            revalidate_url: revalidate_url.into(),
            script_timeout: Duration::from_millis(3_000),
            retry_count: 3,
            retry_delay: Duration::from_millis(3_000),
            page_size: 5,
            http_timeout: Duration::from_millis(10_000),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - WEB_SITE_URL (default: http://127.0.0.1:3001/api/revalidate)
    /// - SCRIPT_TIMEOUT_MS (default: 3000)
    /// - ISR_RETRY_COUNT (default: 3)
    /// - ISR_RETRY_DELAY_MS (default: 3000)
    /// - ISR_PAGE_SIZE (default: 5)
    /// - REVALIDATE_HTTP_TIMEOUT_MS (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`], reading values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let revalidate_url = lookup("WEB_SITE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.revalidate_url);

        let script_timeout = parse_or(&lookup, "SCRIPT_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.script_timeout);

        let retry_count = parse_or(&lookup, "ISR_RETRY_COUNT")?.unwrap_or(defaults.retry_count);

        let retry_delay = parse_or(&lookup, "ISR_RETRY_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_delay);

        let page_size = parse_or(&lookup, "ISR_PAGE_SIZE")?.unwrap_or(defaults.page_size);

        let http_timeout = parse_or(&lookup, "REVALIDATE_HTTP_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.http_timeout);

        let config = Self {
            revalidate_url,
            script_timeout,
            retry_count,
            retry_delay,
            page_size,
            http_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.revalidate_url.starts_with("http://")
            && !self.revalidate_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(
                "WEB_SITE_URL must start with http:// or https://",
            ));
        }

        if self.script_timeout.is_zero() {
            return Err(ConfigError::Invalid("script timeout must be greater than 0"));
        }

        if self.retry_count == 0 {
            return Err(ConfigError::Invalid("retry count must be greater than 0"));
        }

        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page size must be greater than 0"));
        }

        if self.http_timeout.is_zero() {
            return Err(ConfigError::Invalid("http timeout must be greater than 0"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_REVALIDATE_URL)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.revalidate_url, DEFAULT_REVALIDATE_URL);
        assert_eq!(config.script_timeout, Duration::from_secs(3));
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(3));
        assert_eq!(config.page_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("WEB_SITE_URL", "https://blog.example/api/revalidate"),
            ("SCRIPT_TIMEOUT_MS", "250"),
            ("ISR_PAGE_SIZE", "10"),
        ]))
        .unwrap();

        assert_eq!(config.revalidate_url, "https://blog.example/api/revalidate");
        assert_eq!(config.script_timeout, Duration::from_millis(250));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.retry_count, 3);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = Config::from_lookup(lookup(&[("ISR_RETRY_COUNT", "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "ISR_RETRY_COUNT",
                value: "many".to_string()
            }
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.revalidate_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.revalidate_url = DEFAULT_REVALIDATE_URL.to_string();

        config.script_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.script_timeout = Duration::from_secs(1);

        config.page_size = 0;
        assert!(config.validate().is_err());
    }
}
