//! Process-wide API credentials, read once at start-up.

use std::env;
use std::fmt;

/// An API key that never shows up in `Debug` output or logs.
#[derive(Clone)]
pub(crate) struct ApiKey(String);

impl ApiKey {
    /// Reads `var` from the environment. Unset or blank values yield `None`.
    pub(crate) fn from_env(var: &str) -> Option<Self> {
        env::var(var).ok().and_then(|v| Self::parse(&v))
    }

    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self("test-key".to_string())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Reads a non-blank environment variable, trimmed.
pub(crate) fn optional_var(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
