//! Per-submission state record and the generation-guarded session that owns it.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::debug;

use super::sources::FetchedSource;
use super::{Answer, Orchestrator, PipelineError};
use crate::exa::ContentClient;
use crate::openai::CompletionClient;

/// The only error text a user ever sees. Causes go to the log.
pub const USER_ERROR: &str = "An error occurred while processing your query.";

/// What a rendering shell needs to draw one submission.
///
/// Once `loading` is false, either `error` is set and everything else is
/// empty, or `error` is absent and `result` is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub loading: bool,
    pub result: Option<String>,
    pub sources: Vec<FetchedSource>,
    pub error: Option<String>,
    pub related_questions: Vec<String>,
}

impl PipelineState {
    pub fn started() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn succeeded(answer: Answer) -> Self {
        Self {
            loading: false,
            result: Some(answer.summary),
            sources: answer.sources,
            error: None,
            related_questions: answer.related_questions,
        }
    }

    /// Partial progress is discarded: only the generic message survives.
    pub fn failed() -> Self {
        Self {
            loading: false,
            error: Some(USER_ERROR.to_string()),
            ..Self::default()
        }
    }

    pub fn finished(outcome: Result<Answer, PipelineError>) -> Self {
        match outcome {
            Ok(answer) => Self::succeeded(answer),
            Err(_) => Self::failed(),
        }
    }
}

/// Identifies one submission to a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    generation: u64,
}

impl RunTicket {
    pub fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    #[serde(flatten)]
    pub state: PipelineState,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    state: PipelineState,
}

/// Single shared state record. Every submission bumps the generation, and a
/// run may only publish its result while its generation is still current.
#[derive(Debug, Default)]
pub struct Session {
    inner: Mutex<Inner>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is replaced wholesale, so a poisoned lock still holds a valid record.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a new submission, overwriting whatever the previous one left.
    pub fn begin(&self) -> RunTicket {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = PipelineState::started();
        RunTicket {
            generation: inner.generation,
        }
    }

    /// Publishes `state` if `ticket` is still the latest submission.
    pub fn finish(&self, ticket: RunTicket, state: PipelineState) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            debug!(
                stale = ticket.generation,
                current = inner.generation,
                "discarding result of superseded run"
            );
            return false;
        }
        inner.state = state;
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            generation: inner.generation,
            state: inner.state.clone(),
        }
    }

    /// Starts a background run for `query` and returns its ticket at once.
    pub fn submit<L, C>(
        self: &Arc<Self>,
        engine: Arc<Orchestrator<L, C>>,
        query: String,
    ) -> RunTicket
    where
        L: CompletionClient + Send + Sync + 'static,
        C: ContentClient + Send + Sync + 'static,
    {
        let ticket = self.begin();
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let state = engine.answer(&query).await;
            session.finish(ticket, state);
        });
        ticket
    }
}
