use crate::core::retry::{RetryPolicy, RetryableFetch};
use crate::core::table::TableQuery;
use crate::domain::model::{CredentialsMode, FetchRequest, FetchResponse, Page, Record};
use crate::domain::ports::HttpTransport;
use crate::utils::error::{ClientError, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Envelope fields the backend wraps row lists in.
const ENVELOPE_FIELDS: [&str; 3] = ["data", "results", "items"];

/// Client for the dashboard's JSON endpoints, with retries on every request.
pub struct DashboardClient<T: HttpTransport> {
    base_url: String,
    fetcher: RetryableFetch<T>,
    credentials: CredentialsMode,
    abort: Option<CancellationToken>,
}

impl<T: HttpTransport> DashboardClient<T> {
    pub fn new(base_url: impl Into<String>, transport: T, policy: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            fetcher: RetryableFetch::new(transport, policy),
            credentials: CredentialsMode::default(),
            abort: None,
        }
    }

    pub fn with_credentials(mut self, mode: CredentialsMode) -> Self {
        self.credentials = mode;
        self
    }

    /// Every request made through this client stops when `token` is cancelled.
    pub fn with_abort_signal(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: &str, path: &str) -> FetchRequest {
        let mut request = FetchRequest::new(method, self.url_for(path))
            .header("Accept", "application/json")
            .credentials(self.credentials);
        if let Some(token) = &self.abort {
            request = request.abort_signal(token.clone());
        }
        request
    }

    async fn execute(&self, request: FetchRequest) -> Result<FetchResponse> {
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, url = %request.url, "Request failed");
            return Err(ClientError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_records(&self, path: &str) -> Result<Vec<Record>> {
        let response = self.execute(self.request("GET", path)).await?;
        let value: Value = response.json()?;
        let records = records_from_json(value);
        tracing::debug!(count = records.len(), "Fetched records");
        Ok(records)
    }

    pub async fn fetch_table(&self, path: &str, query: &TableQuery) -> Result<Page<Record>> {
        let records = self.fetch_records(path).await?;
        query.apply(records)
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let request = self.request("POST", path).json_body(body);
        let response = self.execute(request).await?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(response.json()?)
    }
}

/// Turns an API payload into rows. Arrays yield one row per object; an
/// object wrapping its rows in `data`, `results` or `items` is unwrapped;
/// any other object is a single row.
pub fn records_from_json(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(obj) => Some(Record::from(obj)),
                _ => None,
            })
            .collect(),
        Value::Object(mut obj) => {
            let envelope = ENVELOPE_FIELDS
                .iter()
                .find(|field| obj.get(**field).is_some_and(Value::is_array));
            match envelope {
                Some(field) => obj
                    .remove(*field)
                    .map(records_from_json)
                    .unwrap_or_default(),
                None => vec![Record::from(obj)],
            }
        }
        _ => Vec::new(),
    }
}
