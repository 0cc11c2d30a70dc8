//! Query orchestration: discovery → retrieval → (summary ∥ related questions).

pub mod discovery;
pub mod sources;
pub mod state;
pub mod synthesis;

pub use sources::FetchedSource;
pub use state::{PipelineState, Session, SessionSnapshot};

use futures::future::try_join;
use tracing::{debug, error, info};

use crate::exa::{ContentClient, ExaError};
use crate::openai::{CompletionClient, OpenAiError, OutputFormat};

pub(crate) const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no valid URLs found in the discovery response")]
    NoSourcesFound,

    #[error("completion failed: {0}")]
    Completion(#[from] OpenAiError),

    #[error("content retrieval failed: {0}")]
    Retrieval(#[from] ExaError),

    #[error("retrieved source has an invalid URL {url:?}: {source}")]
    InvalidSourceUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Everything a successful run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub summary: String,
    pub sources: Vec<FetchedSource>,
    pub related_questions: Vec<String>,
}

/// Runs the four-step pipeline against a completion backend and a
/// content-retrieval backend. Holds no per-run state; every call starts from
/// scratch.
pub struct Orchestrator<L, C> {
    llm: L,
    content: C,
}

impl<L, C> Orchestrator<L, C>
where
    L: CompletionClient + Sync,
    C: ContentClient + Sync,
{
    pub fn new(llm: L, content: C) -> Self {
        Self { llm, content }
    }

    pub async fn run(&self, query: &str) -> Result<Answer, PipelineError> {
        info!(query, "pipeline started");

        let urls = self.discover(query).await?;
        let sources = self.retrieve(&urls).await?;

        let context = synthesis::join_context(&sources);
        let (summary, related_questions) =
            try_join(self.summarize(&context), self.related_questions(query)).await?;

        info!(
            sources = sources.len(),
            related = related_questions.len(),
            "pipeline complete"
        );
        Ok(Answer {
            summary,
            sources,
            related_questions,
        })
    }

    /// [`run`](Self::run) folded into a finished state. The failure cause is
    /// logged and replaced by the generic user message.
    pub async fn answer(&self, query: &str) -> PipelineState {
        let outcome = self.run(query).await;
        if let Err(e) = &outcome {
            error!(error = %e, "pipeline failed");
        }
        PipelineState::finished(outcome)
    }

    async fn discover(&self, query: &str) -> Result<Vec<String>, PipelineError> {
        let messages = discovery::discovery_messages(query);
        let raw = self.llm.complete(&messages, OutputFormat::JsonObject).await?;
        let urls = discovery::extract_candidates(raw.trim());
        if urls.is_empty() {
            return Err(PipelineError::NoSourcesFound);
        }
        debug!(count = urls.len(), "sources discovered");
        Ok(urls)
    }

    async fn retrieve(&self, urls: &[String]) -> Result<Vec<FetchedSource>, PipelineError> {
        let documents = self.content.contents(urls).await?;
        debug!(
            requested = urls.len(),
            returned = documents.len(),
            "contents retrieved"
        );
        documents
            .into_iter()
            .map(|doc| {
                let url = doc.url.clone();
                FetchedSource::from_document(doc)
                    .map_err(|source| PipelineError::InvalidSourceUrl { url, source })
            })
            .collect()
    }

    async fn summarize(&self, context: &str) -> Result<String, PipelineError> {
        let messages = synthesis::summary_messages(context);
        let raw = self.llm.complete(&messages, OutputFormat::Text).await?;
        Ok(synthesis::summary_from(&raw))
    }

    async fn related_questions(&self, query: &str) -> Result<Vec<String>, PipelineError> {
        let messages = synthesis::related_messages(query);
        let raw = self.llm.complete(&messages, OutputFormat::Text).await?;
        Ok(synthesis::split_related(&raw))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Barrier;

    use super::testing::{MockContent, MockLlm, Step, doc};
    use super::*;
    use crate::openai::Message;
    use crate::pipeline::state::USER_ERROR;

    /// Synthesis steps only complete once both are in flight together.
    struct RendezvousLlm {
        barrier: Barrier,
    }

    impl CompletionClient for RendezvousLlm {
        async fn complete(
            &self,
            messages: &[Message],
            _format: OutputFormat,
        ) -> Result<String, OpenAiError> {
            match Step::of(messages) {
                Step::Discovery => Ok("https://a.example".into()),
                step => {
                    self.barrier.wait().await;
                    Ok(format!("{step:?} done"))
                }
            }
        }
    }

    const DISCOVERY: &str = "See https://a.example and https://b.example";

    fn photosynthesis_backends() -> (MockLlm, MockContent) {
        let llm = MockLlm::new(
            DISCOVERY,
            "Plants turn light into chemical energy.",
            "How do plants breathe?\nWhat is chlorophyll?",
        );
        let content = MockContent::returning(vec![
            doc("https://a.example/", "Light reactions happen in thylakoids."),
            doc("https://b.example/", "The Calvin cycle fixes carbon."),
        ]);
        (llm, content)
    }

    #[tokio::test]
    async fn end_to_end_photosynthesis() {
        let (llm, content) = photosynthesis_backends();
        let engine = Orchestrator::new(llm, content);

        let state = engine.answer("What is photosynthesis?").await;

        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.sources.len(), 2);
        assert_eq!(
            state.result.as_deref(),
            Some("Plants turn light into chemical energy.")
        );
        assert_eq!(
            state.related_questions,
            vec!["How do plants breathe?", "What is chlorophyll?"]
        );
        assert_eq!(state.sources[0].favicon_url, "https://a.example/favicon.ico");

        assert_eq!(
            engine.content.requests(),
            vec![vec!["https://a.example".to_string(), "https://b.example".to_string()]]
        );
    }

    #[tokio::test]
    async fn summary_uses_fetched_text_and_related_uses_query() {
        let (llm, content) = photosynthesis_backends();
        let engine = Orchestrator::new(llm, content);
        engine.run("What is photosynthesis?").await.unwrap();

        let summary_prompt = engine.llm.prompt_for(Step::Summary);
        assert!(summary_prompt.ends_with(
            "Light reactions happen in thylakoids.\nThe Calvin cycle fixes carbon."
        ));
        assert!(!summary_prompt.contains("What is photosynthesis?"));

        let related_prompt = engine.llm.prompt_for(Step::Related);
        assert!(related_prompt.contains("\"What is photosynthesis?\""));
        assert!(!related_prompt.contains("thylakoids"));
    }

    #[tokio::test]
    async fn discovery_requests_json_and_synthesis_requests_text() {
        let (llm, content) = photosynthesis_backends();
        let engine = Orchestrator::new(llm, content);
        engine.run("q").await.unwrap();

        let calls = engine.llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, Step::Discovery);
        for (step, _, format) in calls.iter() {
            let expected = if *step == Step::Discovery {
                OutputFormat::JsonObject
            } else {
                OutputFormat::Text
            };
            assert_eq!(*format, expected, "format for {step:?}");
        }
    }

    #[tokio::test]
    async fn summary_and_related_questions_run_concurrently() {
        let engine = Orchestrator::new(
            RendezvousLlm {
                barrier: Barrier::new(2),
            },
            MockContent::returning(vec![doc("https://a.example", "t")]),
        );

        let answer = tokio::time::timeout(Duration::from_secs(5), engine.run("q"))
            .await
            .expect("synthesis calls overlap instead of running one after another")
            .unwrap();

        assert_eq!(answer.summary, "Summary done");
        assert_eq!(answer.related_questions, vec!["Related done"]);
    }

    #[tokio::test]
    async fn no_urls_fails_without_retrieval() {
        let llm = MockLlm::new("I don't know any sources.", "unused", "unused");
        let engine = Orchestrator::new(llm, MockContent::returning(vec![]));

        let err = engine.run("q").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoSourcesFound));
        assert!(engine.content.requests().is_empty());
        assert_eq!(engine.llm.steps(), vec![Step::Discovery]);
    }

    #[tokio::test]
    async fn retrieval_gets_deduplicated_list_in_extraction_order() {
        let llm = MockLlm::new(
            "https://z.example, https://m.example. Also https://z.example!",
            "s",
            "r",
        );
        let engine = Orchestrator::new(llm, MockContent::returning(vec![doc("https://z.example", "")]));
        engine.run("q").await.unwrap();

        assert_eq!(
            engine.content.requests(),
            vec![vec!["https://z.example".to_string(), "https://m.example".to_string()]]
        );
    }

    #[tokio::test]
    async fn favicon_follows_returned_url() {
        let llm = MockLlm::new("https://short.example", "s", "r");
        let content = MockContent::returning(vec![doc("https://www.long.example/article", "t")]);
        let engine = Orchestrator::new(llm, content);

        let answer = engine.run("q").await.unwrap();
        assert_eq!(answer.sources[0].url, "https://www.long.example/article");
        assert_eq!(
            answer.sources[0].favicon_url,
            "https://www.long.example/favicon.ico"
        );
    }

    #[tokio::test]
    async fn missing_retrieval_results_are_silently_absent() {
        let llm = MockLlm::new("https://a.example https://b.example https://c.example", "s", "r");
        let content = MockContent::returning(vec![doc("https://c.example", "only c")]);
        let engine = Orchestrator::new(llm, content);

        let answer = engine.run("q").await.unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].text, "only c");
    }

    #[tokio::test]
    async fn every_step_failure_yields_generic_error_state() {
        let failing_discovery = Orchestrator::new(
            MockLlm {
                discovery: None,
                ..MockLlm::new("", "s", "r")
            },
            MockContent::returning(vec![doc("https://a.example", "t")]),
        );
        let failing_retrieval = Orchestrator::new(
            MockLlm::new("https://a.example", "s", "r"),
            MockContent::failing(),
        );
        let failing_summary = Orchestrator::new(
            MockLlm {
                summary: None,
                ..MockLlm::new("https://a.example", "", "r")
            },
            MockContent::returning(vec![doc("https://a.example", "t")]),
        );
        let failing_related = Orchestrator::new(
            MockLlm {
                related: None,
                ..MockLlm::new("https://a.example", "s", "")
            },
            MockContent::returning(vec![doc("https://a.example", "t")]),
        );
        let bad_source_url = Orchestrator::new(
            MockLlm::new("https://a.example", "s", "r"),
            MockContent::returning(vec![doc("not a url", "t")]),
        );

        let states = [
            failing_discovery.answer("q").await,
            failing_retrieval.answer("q").await,
            failing_summary.answer("q").await,
            failing_related.answer("q").await,
            bad_source_url.answer("q").await,
        ];

        for (i, state) in states.iter().enumerate() {
            assert!(!state.loading, "case {i}");
            assert_eq!(state.error.as_deref(), Some(USER_ERROR), "case {i}");
            assert!(state.result.is_none(), "case {i}");
            assert!(state.sources.is_empty(), "case {i}");
            assert!(state.related_questions.is_empty(), "case {i}");
        }
    }

    #[tokio::test]
    async fn invalid_returned_url_is_reported() {
        let engine = Orchestrator::new(
            MockLlm::new("https://a.example", "s", "r"),
            MockContent::returning(vec![doc("::nope::", "t")]),
        );
        match engine.run("q").await {
            Err(PipelineError::InvalidSourceUrl { url, .. }) => assert_eq!(url, "::nope::"),
            other => panic!("expected InvalidSourceUrl, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_query_twice_runs_everything_twice() {
        let (llm, content) = photosynthesis_backends();
        let engine = Orchestrator::new(llm, content);

        let first = engine.answer("What is photosynthesis?").await;
        let second = engine.answer("What is photosynthesis?").await;

        assert_eq!(first, second);
        assert_eq!(engine.llm.steps().len(), 6);
        assert_eq!(engine.content.requests().len(), 2);
    }

    #[tokio::test]
    async fn session_submit_publishes_finished_state() {
        let (llm, content) = photosynthesis_backends();
        let engine = Arc::new(Orchestrator::new(llm, content));
        let session = Arc::new(Session::new());

        let ticket = session.submit(Arc::clone(&engine), "What is photosynthesis?".into());

        let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snap = session.snapshot();
                if !snap.state.loading {
                    return snap;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("run finishes");

        assert_eq!(snapshot.generation, ticket.generation());
        assert!(snapshot.state.error.is_none());
        assert_eq!(snapshot.state.sources.len(), 2);
    }
}
