use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::{ApiError, ChatRequest, ChatResponse, Message, OutputFormat};
use crate::credentials::{self, ApiKey};

const API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const ERROR_SNIPPET_BYTES: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("OPENAI_API_KEY not set. Create one at https://platform.openai.com/api-keys")]
    ApiKeyNotSet,

    #[error("completion API rate limit exceeded")]
    RateLimited,

    #[error("completion API rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("completion API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Chat-completion backend used by the pipeline.
/// Implemented by `OpenAiClient` for production; tests substitute recording mocks.
pub trait CompletionClient {
    /// Sends `messages` and returns the first completion's text, untrimmed.
    fn complete(
        &self,
        messages: &[Message],
        format: OutputFormat,
    ) -> impl Future<Output = Result<String, OpenAiError>> + Send;
}

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn from_env(http: Client) -> Result<Self, OpenAiError> {
        let api_key = ApiKey::from_env("OPENAI_API_KEY").ok_or(OpenAiError::ApiKeyNotSet)?;
        let model =
            credentials::optional_var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self {
            http,
            api_key,
            model,
            base_url: API_BASE.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::for_tests(),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
        }
    }

    async fn chat(
        &self,
        messages: &[Message],
        format: OutputFormat,
    ) -> Result<ChatResponse, OpenAiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            response_format: format.response_format(),
        };

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("completion API rate limited");
            return Err(OpenAiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let structured = serde_json::from_str::<ChatResponse>(&text)
                .ok()
                .and_then(|body| body.error);
            let classified = match structured {
                Some(err) => classify_api_error(status, &err),
                None => {
                    let end = text.floor_char_boundary(ERROR_SNIPPET_BYTES);
                    classify_status(status, format!("HTTP {status}: {}", &text[..end]))
                }
            };
            warn!(status = %status, error = %classified, "completion API error");
            return Err(classified);
        }

        let body: ChatResponse = response.json().await?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(status, err);
            warn!(error = %classified, "completion API error in 200 response");
            return Err(classified);
        }

        debug!(model = %self.model, "completion received");
        Ok(body)
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        format: OutputFormat,
    ) -> Result<String, OpenAiError> {
        Ok(self.chat(messages, format).await?.first_text())
    }
}

fn classify_api_error(status: StatusCode, err: &ApiError) -> OpenAiError {
    let message = match (&err.message, &err.kind) {
        (Some(m), Some(k)) => format!("{m} ({k})"),
        (Some(m), None) => m.clone(),
        (None, Some(k)) => k.clone(),
        (None, None) => "Unknown error".to_string(),
    };
    classify_status(status, message)
}

fn classify_status(status: StatusCode, message: String) -> OpenAiError {
    match status.as_u16() {
        429 => OpenAiError::RateLimited,
        401 | 403 => OpenAiError::Unauthorized(message),
        code => OpenAiError::Api { code, message },
    }
}
