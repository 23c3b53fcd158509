use crate::domain::model::{FetchRequest, FetchResponse};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Sends exactly one HTTP request. Retrying is the caller's job.
///
/// Implementations report transport failures as errors (`Transport`,
/// `Network`, `EmptyResponse`) and a fired abort signal as `Aborted`. Any
/// HTTP status, including 5xx, is a successful send.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

