use crate::config::toml_config::{ClientConfig, RetrySection, TableSection};
use crate::core::output::OutputFormat;
use crate::core::table::TableQuery;
use crate::domain::model::{CredentialsMode, SortDirection};
use crate::utils::error::{ClientError, Result};
use crate::utils::validation::validate_api_path;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "open-monitor")]
#[command(about = "Fetch Open Monitor dashboard data with retries and query it locally")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Dashboard base URL (overrides client.base_url)
    #[arg(long)]
    pub base_url: Option<String>,

    /// API endpoint to fetch
    #[arg(long, default_value = "/api/vulnerabilities")]
    pub path: String,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub backoff_ms: Option<u64>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// omit, same-origin or include
    #[arg(long)]
    pub credentials: Option<CredentialsMode>,

    /// Case-insensitive text filter
    #[arg(long)]
    pub filter: Option<String>,

    /// Only search this column
    #[arg(long)]
    pub filter_column: Option<String>,

    /// Column to sort by
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long)]
    pub descending: bool,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long)]
    pub page_size: Option<usize>,

    /// json or csv
    #[arg(long, default_value = "json")]
    pub format: String,

    /// Read filter terms and commands from stdin
    #[arg(short, long)]
    pub interactive: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Loads the config file (if any) and applies command line overrides.
    pub fn load_config(&self) -> Result<ClientConfig> {
        validate_api_path("--path", &self.path)?;

        let mut config = match (&self.config, &self.base_url) {
            (Some(path), _) => ClientConfig::from_file(path)?,
            (None, Some(base_url)) => ClientConfig::from_base_url(base_url.clone()),
            (None, None) => {
                return Err(ClientError::MissingConfigError {
                    field: "--config or --base-url".to_string(),
                })
            }
        };

        if let Some(base_url) = &self.base_url {
            config.client.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout_seconds {
            config.client.timeout_seconds = Some(timeout);
        }
        if let Some(mode) = self.credentials {
            config.client.credentials = Some(mode);
        }
        if self.max_retries.is_some() || self.backoff_ms.is_some() {
            let retry = config.retry.get_or_insert_with(RetrySection::default);
            if let Some(max_retries) = self.max_retries {
                retry.max_retries = Some(max_retries);
            }
            if let Some(backoff_ms) = self.backoff_ms {
                retry.backoff_ms = Some(backoff_ms);
            }
        }
        if let Some(page_size) = self.page_size {
            config
                .table
                .get_or_insert_with(TableSection::default)
                .page_size = Some(page_size);
        }

        Ok(config)
    }

    pub fn table_query(&self, config: &ClientConfig) -> TableQuery {
        let mut query = TableQuery::new()
            .page(self.page)
            .page_size(config.page_size());
        query.filter = self.filter.clone();
        query.filter_column = self.filter_column.clone();
        if let Some(column) = &self.sort {
            let direction = if self.descending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            query = query.sorted_by(column.clone(), direction);
        }
        query
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        self.format.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;

    #[test]
    fn test_overrides_apply_on_top_of_base_url() {
        let args = CliArgs::parse_from([
            "open-monitor",
            "--base-url",
            "https://monitor.example.com",
            "--max-retries",
            "5",
            "--credentials",
            "omit",
            "--page-size",
            "50",
            "--sort",
            "cvss",
            "--descending",
            "--format",
            "csv",
        ]);

        let config = args.load_config().unwrap();
        assert_eq!(config.retry_policy(), RetryPolicy::new(5, 300));
        assert_eq!(config.credentials(), CredentialsMode::Omit);
        assert_eq!(config.page_size(), 50);

        let query = args.table_query(&config);
        assert_eq!(query.page_size, 50);
        let sort = query.sort.unwrap();
        assert_eq!(sort.column, "cvss");
        assert_eq!(sort.direction, SortDirection::Descending);
        assert_eq!(args.output_format().unwrap(), OutputFormat::Csv);
    }

    #[test]
    fn test_missing_config_and_base_url() {
        let args = CliArgs::parse_from(["open-monitor"]);
        assert!(matches!(
            args.load_config(),
            Err(ClientError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_credentials_mode() {
        let parsed = CliArgs::try_parse_from([
            "open-monitor",
            "--base-url",
            "https://monitor.example.com",
            "--credentials",
            "sometimes",
        ]);
        assert!(parsed.is_err());
    }
}
