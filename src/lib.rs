pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::ClientConfig;

pub use adapters::http::ReqwestTransport;
pub use crate::core::{
    dashboard::DashboardClient,
    rate_limit::{Debounced, Debouncer, Throttle, DEFAULT_DEBOUNCE_KEY},
    retry::{is_retryable_status, RetryPolicy, RetryableFetch},
    table::TableQuery,
};
pub use domain::model::{CredentialsMode, FetchRequest, FetchResponse, Page, Record, SortDirection};
pub use domain::ports::HttpTransport;
pub use utils::error::{ClientError, Result};
