//! Explicit start-up of the production pipeline: one shared HTTP client and
//! both API clients configured from the environment.

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::exa::{ExaClient, ExaError};
use crate::openai::{OpenAiClient, OpenAiError};
use crate::pipeline::Orchestrator;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_REDIRECTS: usize = 5;

pub type Engine = Orchestrator<OpenAiClient, ExaClient>;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Completion(#[from] OpenAiError),

    #[error("{0}")]
    Content(#[from] ExaError),
}

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

/// Fails fast when either credential is missing.
pub fn from_env(model: Option<String>) -> Result<Engine, InitError> {
    let http = build_http_client()?;
    let mut llm = OpenAiClient::from_env(http.clone())?;
    if let Some(model) = model {
        llm = llm.with_model(model);
    }
    let content = ExaClient::from_env(http)?;
    info!(model = %llm.model(), "pipeline clients ready");
    Ok(Orchestrator::new(llm, content))
}

#[cfg(test)]
pub(crate) fn for_mock_servers(llm_base: &str, content_base: &str) -> Engine {
    let http = Client::new();
    Orchestrator::new(
        OpenAiClient::with_base_url(http.clone(), llm_base),
        ExaClient::with_base_url(http, content_base),
    )
}
