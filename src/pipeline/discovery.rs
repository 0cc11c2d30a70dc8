//! Source discovery: prompt construction and candidate URL extraction.
//!
//! The model is asked for `{"urls": [...]}`. When the reply is JSON of any
//! shape, every string value in it is searched for URLs; only replies that are
//! not JSON get the raw-text scan. Either way every candidate is cleaned,
//! validated as an absolute HTTP(S) URL and deduplicated, keeping first-seen
//! order.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::openai::Message;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("URL pattern compiles"));

/// Characters a model tends to leave glued to the end of a URL in prose or
/// Markdown.
const TRAILING_JUNK: &[char] = &[
    '.', ',', ';', ':', '!', '?', '"', '\'', ']', '}', '>', '*', '`',
];

/// A scan that ran across a JSON or quoted-list boundary leaves these inside
/// the match.
const SEPARATORS: &[char] = &['"', '\'', ','];

pub fn discovery_messages(query: &str) -> [Message; 2] {
    [
        Message::system(super::SYSTEM_PROMPT),
        Message::user(format!(
            "Given the query: \"{query}\", provide a list of relevant URLs or sources that could be used to answer the question. \
             Respond with a JSON object of the form {{\"urls\": [\"https://...\"]}} listing absolute URLs only."
        )),
    ]
}

/// Extracts source candidates from a discovery completion.
pub fn extract_candidates(raw: &str) -> Vec<String> {
    let candidates = match parse_json(raw) {
        Some(value) => {
            let mut found = Vec::new();
            collect_json_urls(&value, &mut found);
            debug!(count = found.len(), "discovery: URLs from JSON reply");
            found
        }
        None => {
            let found = scan_urls(raw);
            debug!(count = found.len(), "discovery: scanned free text for URLs");
            found
        }
    };
    normalize(candidates)
}

fn parse_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    // Models sometimes wrap the object in a code fence or a sentence.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}

/// Depth-first over the document, in key order as written.
fn collect_json_urls(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::String(s) => found.extend(scan_urls(s)),
        Value::Array(items) => items.iter().for_each(|v| collect_json_urls(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_json_urls(v, found)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Every `https?://` run of characters up to whitespace or `)`.
pub fn scan_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn normalize(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|c| clean_candidate(&c))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Strips trailing punctuation and keeps the candidate only if it is free of
/// quote/comma separators and parses as an absolute HTTP(S) URL with a host.
fn clean_candidate(candidate: &str) -> Option<String> {
    let cleaned = candidate.trim().trim_end_matches(TRAILING_JUNK);
    if cleaned.contains(SEPARATORS) {
        return None;
    }
    let parsed = url::Url::parse(cleaned).ok()?;
    let web = matches!(parsed.scheme(), "http" | "https");
    let has_host = parsed.host_str().is_some_and(|h| !h.is_empty());
    (web && has_host).then(|| cleaned.to_string())
}
