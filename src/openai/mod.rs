//! Chat-completion client for the language-model service.

pub mod client;
pub mod types;

pub use client::{CompletionClient, OpenAiClient, OpenAiError};
pub use types::{Message, OutputFormat};
