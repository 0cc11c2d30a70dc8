//! Summary and related-question prompts and response shaping.

use super::sources::FetchedSource;
use crate::openai::Message;

pub const EMPTY_SUMMARY: &str = "No response generated.";

/// All source texts joined by newlines. No truncation.
pub fn join_context(sources: &[FetchedSource]) -> String {
    sources
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_messages(context: &str) -> [Message; 2] {
    [
        Message::system(super::SYSTEM_PROMPT),
        Message::user(format!(
            "Given the following texts from various sources, summarize them:\n\n{context}"
        )),
    ]
}

pub fn related_messages(query: &str) -> [Message; 2] {
    [
        Message::system(super::SYSTEM_PROMPT),
        Message::user(format!(
            "Given the query: \"{query}\", provide a list of related questions that might also be useful. Just list them - no yap"
        )),
    ]
}

pub fn summary_from(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        EMPTY_SUMMARY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits a related-questions completion on `'\n'`. Only the response as a
/// whole is trimmed; entries keep list markers and blank lines survive.
pub fn split_related(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('\n').map(str::to_string).collect()
}
