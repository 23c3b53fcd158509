use crate::core::rate_limit::DEFAULT_DEBOUNCE_KEY;
use crate::core::retry::{RetryPolicy, DEFAULT_BACKOFF_MS, DEFAULT_MAX_RETRIES};
use crate::core::table::DEFAULT_PAGE_SIZE;
use crate::domain::model::CredentialsMode;
use crate::utils::error::{ClientError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_THROTTLE_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client: ClientSection,
    pub retry: Option<RetrySection>,
    pub table: Option<TableSection>,
    pub rate_limit: Option<RateLimitSection>,
    pub monitoring: Option<MonitoringSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    pub credentials: Option<CredentialsMode>,
    pub session_cookie: Option<String>,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSection {
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitSection {
    pub debounce_ms: Option<u64>,
    pub throttle_ms: Option<u64>,
    /// Registry key for the filter input. Unset means the shared default key.
    pub filter_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringSection {
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

impl ClientConfig {
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: ClientSection {
                base_url: base_url.into(),
                timeout_seconds: None,
                credentials: None,
                session_cookie: None,
                bearer_token: None,
            },
            retry: None,
            table: None,
            rate_limit: None,
            monitoring: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ClientError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ClientError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unset variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ClientError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("client.base_url", &self.client.base_url)?;

        if let Some(timeout) = self.client.timeout_seconds {
            validation::validate_range("client.timeout_seconds", timeout, 1, 600)?;
        }
        if let Some(max_retries) = self.retry.as_ref().and_then(|r| r.max_retries) {
            validation::validate_range("retry.max_retries", max_retries, 0, 10)?;
        }
        if let Some(page_size) = self.table.as_ref().and_then(|t| t.page_size) {
            validation::validate_positive_number("table.page_size", page_size, 1)?;
        }
        if let Some(level) = self.monitoring.as_ref().and_then(|m| m.log_level.as_deref()) {
            validation::validate_one_of(
                "monitoring.log_level",
                level,
                &["trace", "debug", "info", "warn", "error"],
            )?;
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.client.base_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn credentials(&self) -> CredentialsMode {
        self.client.credentials.unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        RetryPolicy::new(
            retry.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS),
        )
    }

    pub fn page_size(&self) -> usize {
        self.table
            .as_ref()
            .and_then(|t| t.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn debounce_wait(&self) -> Duration {
        Duration::from_millis(
            self.rate_limit
                .as_ref()
                .and_then(|r| r.debounce_ms)
                .unwrap_or(DEFAULT_DEBOUNCE_MS),
        )
    }

    pub fn throttle_limit(&self) -> Duration {
        Duration::from_millis(
            self.rate_limit
                .as_ref()
                .and_then(|r| r.throttle_ms)
                .unwrap_or(DEFAULT_THROTTLE_MS),
        )
    }

    pub fn filter_key(&self) -> &str {
        self.rate_limit
            .as_ref()
            .and_then(|r| r.filter_key.as_deref())
            .unwrap_or(DEFAULT_DEBOUNCE_KEY)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
