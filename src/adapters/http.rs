//! Production [`HttpTransport`] on top of `reqwest`.

use crate::domain::model::{CredentialsMode, FetchRequest, FetchResponse};
use crate::domain::ports::HttpTransport;
use crate::utils::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::Method;
use std::time::Duration;
use url::{Origin, Url};

/// Sends requests with `reqwest` and attaches the session credential
/// according to each request's [`CredentialsMode`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    origin: Option<Origin>,
    session_cookie: Option<String>,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: None,
            session_cookie: None,
            bearer_token: None,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The origin `same-origin` requests are compared against.
    pub fn with_origin(mut self, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url).map_err(|e| ClientError::InvalidConfigValueError {
            field: "client.base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        self.origin = Some(url.origin());
        Ok(self)
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn attaches_credentials(&self, request: &FetchRequest) -> bool {
        match request.credentials {
            CredentialsMode::Omit => false,
            CredentialsMode::Include => true,
            CredentialsMode::SameOrigin => match (&self.origin, Url::parse(&request.url)) {
                (Some(origin), Ok(url)) => url.origin() == *origin,
                _ => false,
            },
        }
    }

    async fn send_inner(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes()).map_err(|e| {
            ClientError::ValidationError {
                message: format!("Invalid HTTP method '{}': {}", request.method, e),
            }
        })?;

        let mut req = self.client.request(method, &request.url);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if self.attaches_credentials(request) {
            if let Some(cookie) = &self.session_cookie {
                req = req.header(COOKIE, cookie.as_str());
            }
            if let Some(token) = &self.bearer_token {
                req = req.bearer_auth(token);
            }
        }
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let response = req.send().await.map_err(|e| {
            tracing::debug!(url = %request.url, error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        tracing::debug!(
            url = %request.url,
            status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse> {
        match &request.abort {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ClientError::Aborted),
                outcome = self.send_inner(request) => outcome,
            },
            None => self.send_inner(request).await,
        }
    }
}
