use serde::Serialize;
use url::Url;

use crate::exa::Document;

/// A retrieved source ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedSource {
    pub url: String,
    /// Not checked for existence.
    pub favicon_url: String,
    pub text: String,
}

impl FetchedSource {
    /// Builds a source from a retrieved document. The favicon follows the
    /// document's own URL, not the URL that was requested.
    pub fn from_document(doc: Document) -> Result<Self, url::ParseError> {
        let favicon_url = favicon_url(&doc.url)?;
        Ok(Self {
            url: doc.url,
            favicon_url,
            text: doc.text.unwrap_or_default(),
        })
    }
}

/// `/favicon.ico` resolved against the origin of `source`.
pub fn favicon_url(source: &str) -> Result<String, url::ParseError> {
    Url::parse(source)?.join("/favicon.ico").map(String::from)
}
