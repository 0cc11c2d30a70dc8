//! Content-retrieval client: batched full-text fetch for a list of URLs.

pub mod client;
pub mod types;

pub use client::{ContentClient, ExaClient, ExaError};
pub use types::Document;
