use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::{ContentsRequest, ContentsResponse, Document};
use crate::credentials::ApiKey;

const API_BASE: &str = "https://api.exa.ai";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const ERROR_SNIPPET_BYTES: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ExaError {
    #[error("EXA_API_KEY not set. Create one at https://dashboard.exa.ai/api-keys")]
    ApiKeyNotSet,

    #[error("content API rate limit exceeded")]
    RateLimited,

    #[error("content API rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("content API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Content-retrieval backend used by the pipeline.
pub trait ContentClient {
    /// Fetches full text for `urls` in one batched call. The result order and
    /// cardinality are whatever the service returns.
    fn contents(
        &self,
        urls: &[String],
    ) -> impl Future<Output = Result<Vec<Document>, ExaError>> + Send;
}

#[derive(Clone, Debug)]
pub struct ExaClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
}

impl ExaClient {
    pub fn from_env(http: Client) -> Result<Self, ExaError> {
        let api_key = ApiKey::from_env("EXA_API_KEY").ok_or(ExaError::ApiKeyNotSet)?;
        Ok(Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::for_tests(),
            base_url: base_url.to_string(),
        }
    }
}

impl ContentClient for ExaClient {
    async fn contents(&self, urls: &[String]) -> Result<Vec<Document>, ExaError> {
        let url = format!("{}/contents", self.base_url);

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&ContentsRequest { urls, text: true })
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("content API rate limited");
            return Err(ExaError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ContentsResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| {
                    let end = text.floor_char_boundary(ERROR_SNIPPET_BYTES);
                    format!("HTTP {status}: {}", &text[..end])
                });
            let classified = classify_status(status, message);
            warn!(status = %status, error = %classified, "content API error");
            return Err(classified);
        }

        let body: ContentsResponse = response.json().await?;
        if let Some(message) = body.error {
            let classified = classify_status(status, message);
            warn!(error = %classified, "content API error in 200 response");
            return Err(classified);
        }

        debug!(
            requested = urls.len(),
            returned = body.results.len(),
            "contents retrieved"
        );
        Ok(body.results)
    }
}

fn classify_status(status: StatusCode, message: String) -> ExaError {
    match status.as_u16() {
        429 => ExaError::RateLimited,
        401 | 403 => ExaError::Unauthorized(message),
        code => ExaError::Api { code, message },
    }
}
