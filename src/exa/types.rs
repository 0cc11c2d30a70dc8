use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ContentsRequest<'a> {
    pub urls: &'a [String],
    pub text: bool,
}

#[derive(Debug, Deserialize)]
pub struct ContentsResponse {
    #[serde(default)]
    pub results: Vec<Document>,
    pub error: Option<String>,
}

/// One retrieved page. `url` is the service's final URL, which may differ
/// from the requested one after normalization or redirects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Document {
    pub url: String,
    #[serde(default)]
    pub text: Option<String>,
}
