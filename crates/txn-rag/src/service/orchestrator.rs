//! Per-question pipeline
//!
//! Each question gets its own [`QueryContext`] that moves forward through
//! [`QueryStage`]s. Nothing in a context is shared with other queries; the
//! corpus, index and providers it reads are immutable.

use std::fmt;
use std::time::Instant;

use uuid::Uuid;

use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::generation::{CompletionProvider, PromptBuilder, RetryPolicy};
use crate::index::{FlatIndex, Neighbor, VectorIndex};
use crate::retrieval::{AssembledContext, ContextAssembler, Corpus};
use crate::types::SourceRecord;

/// Stage of a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryStage {
    Idle,
    ValidatingInput,
    EmbeddingQuestion,
    Searching,
    AssemblingContext,
    AwaitingCompletion,
    Done,
    Failed,
}

impl QueryStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryStage::Done | QueryStage::Failed)
    }
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStage::Idle => "idle",
            QueryStage::ValidatingInput => "validating_input",
            QueryStage::EmbeddingQuestion => "embedding_question",
            QueryStage::Searching => "searching",
            QueryStage::AssemblingContext => "assembling_context",
            QueryStage::AwaitingCompletion => "awaiting_completion",
            QueryStage::Done => "done",
            QueryStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State carried through one query
#[derive(Debug)]
pub struct QueryContext {
    pub id: Uuid,
    pub question: String,
    pub embedding: Option<Vec<f32>>,
    pub neighbors: Vec<Neighbor>,
    pub context: Option<AssembledContext>,
    stage: QueryStage,
    history: Vec<QueryStage>,
}

impl QueryContext {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            embedding: None,
            neighbors: Vec::new(),
            context: None,
            stage: QueryStage::Idle,
            history: vec![QueryStage::Idle],
        }
    }

    pub fn stage(&self) -> QueryStage {
        self.stage
    }

    /// Every stage entered so far, in order
    pub fn history(&self) -> &[QueryStage] {
        &self.history
    }

    /// Move to `next`. Stages only move forward and terminal stages are final.
    pub fn advance(&mut self, next: QueryStage) -> Result<()> {
        if self.stage.is_terminal() || next <= self.stage {
            return Err(Error::internal(format!(
                "illegal query stage transition {} -> {}",
                self.stage, next
            )));
        }

        tracing::debug!(query_id = %self.id, "{} -> {}", self.stage, next);
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self) {
        if !self.stage.is_terminal() {
            tracing::debug!(query_id = %self.id, "{} -> {}", self.stage, QueryStage::Failed);
            self.stage = QueryStage::Failed;
            self.history.push(QueryStage::Failed);
        }
    }
}

/// Result of a successful query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub id: Uuid,
    pub answer: String,
    /// Retrieved records, nearest first
    pub sources: Vec<SourceRecord>,
    /// Records that made it into the prompt
    pub context_records: usize,
    pub context_truncated: bool,
    pub stages: Vec<QueryStage>,
}

/// Reject blank questions and questions over `max_chars` characters
pub fn validate_question(question: &str, max_chars: usize) -> Result<()> {
    if question.trim().is_empty() {
        return Err(Error::EmptyInput);
    }
    let length = question.chars().count();
    if length > max_chars {
        return Err(Error::invalid_argument(format!(
            "question is {} characters, the limit is {}",
            length, max_chars
        )));
    }
    Ok(())
}

/// Drives a question through validation, retrieval and completion
pub struct QueryOrchestrator<'a> {
    pub corpus: &'a Corpus,
    pub index: &'a FlatIndex,
    pub embedder: &'a dyn Embedder,
    pub completion: &'a dyn CompletionProvider,
    pub assembler: ContextAssembler,
    pub retry: RetryPolicy,
    pub top_k: usize,
    pub max_question_chars: usize,
}

impl QueryOrchestrator<'_> {
    /// Answer one question
    pub async fn run(&self, question: &str) -> Result<QueryOutcome> {
        let start = Instant::now();
        let mut ctx = QueryContext::new(question);

        match self.drive(&mut ctx).await {
            Ok(answer) => {
                ctx.advance(QueryStage::Done)?;
                tracing::info!(
                    query_id = %ctx.id,
                    "Answered in {}ms using {} records",
                    start.elapsed().as_millis(),
                    ctx.context.as_ref().map_or(0, |c| c.records_used)
                );

                let context = ctx.context.take().unwrap_or_default();
                Ok(QueryOutcome {
                    id: ctx.id,
                    answer,
                    sources: SourceRecord::from_neighbors(self.corpus, &ctx.neighbors),
                    context_records: context.records_used,
                    context_truncated: context.truncated,
                    stages: ctx.history,
                })
            }
            Err(e) => {
                let failed_in = ctx.stage();
                ctx.fail();
                if e.is_client_error() {
                    tracing::debug!(query_id = %ctx.id, stage = %failed_in, "Query rejected: {}", e);
                } else {
                    tracing::warn!(query_id = %ctx.id, stage = %failed_in, "Query failed: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn drive(&self, ctx: &mut QueryContext) -> Result<String> {
        ctx.advance(QueryStage::ValidatingInput)?;
        validate_question(&ctx.question, self.max_question_chars)?;

        ctx.advance(QueryStage::EmbeddingQuestion)?;
        let embedding = self.embedder.embed(&ctx.question).await?;

        ctx.advance(QueryStage::Searching)?;
        ctx.neighbors = self.index.search(&embedding, self.top_k)?;
        ctx.embedding = Some(embedding);

        ctx.advance(QueryStage::AssemblingContext)?;
        let context = self.assembler.assemble(self.corpus, &ctx.neighbors);

        ctx.advance(QueryStage::AwaitingCompletion)?;
        let prompt = PromptBuilder::build_prompt(&context.text, &ctx.question);
        ctx.context = Some(context);

        tracing::debug!(
            query_id = %ctx.id,
            "Requesting completion from {} ({})",
            self.completion.name(),
            self.completion.model()
        );

        let answer = self
            .retry
            .run(|| self.completion.complete(&prompt))
            .await?;

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::embeddings::HashEmbedder;
    use crate::error::UpstreamError;
    use crate::ingestion::IngestPipeline;
    use crate::types::TransactionRecord;

    struct Recorder {
        prompts: Mutex<Vec<String>>,
        reply: std::result::Result<String, UpstreamError>,
    }

    impl Recorder {
        fn answering(answer: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reply: Ok(answer.to_string()),
            }
        }

        fn failing(error: UpstreamError) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reply: Err(error),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for Recorder {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, UpstreamError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "recorder"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    struct CountingEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_text(text)
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn records() -> Vec<TransactionRecord> {
        [
            ["1", "City Mall", "Amman", "2024-01-02", "2", "10.0", "Sale", "Completed"],
            ["2", "Taj Mall", "Abdoun", "2024-01-03", "1", "4.5", "Return", "Pending"],
            ["3", "Galleria", "Sweifieh", "2024-01-04", "5", "99.9", "Sale", "Completed"],
        ]
        .iter()
        .map(|r| TransactionRecord::from_fields(r).unwrap())
        .collect()
    }

    async fn fixture() -> (CountingEmbedder, crate::ingestion::IngestedCorpus) {
        let embedder = CountingEmbedder {
            inner: HashEmbedder::new(256),
            calls: AtomicUsize::new(0),
        };
        let ingested = IngestPipeline::new(&embedder.inner).run(records()).await.unwrap();
        (embedder, ingested)
    }

    fn orchestrator<'a>(
        ingested: &'a crate::ingestion::IngestedCorpus,
        embedder: &'a dyn Embedder,
        completion: &'a dyn CompletionProvider,
    ) -> QueryOrchestrator<'a> {
        QueryOrchestrator {
            corpus: &ingested.corpus,
            index: &ingested.index,
            embedder,
            completion,
            assembler: ContextAssembler::new(4000),
            retry: RetryPolicy::no_retry(Duration::from_secs(5)),
            top_k: 2,
            max_question_chars: 100,
        }
    }

    #[test]
    fn test_stages_only_move_forward() {
        let mut ctx = QueryContext::new("q");
        ctx.advance(QueryStage::ValidatingInput).unwrap();
        ctx.advance(QueryStage::Searching).unwrap();
        assert!(ctx.advance(QueryStage::EmbeddingQuestion).is_err());
        assert!(ctx.advance(QueryStage::Searching).is_err());

        ctx.advance(QueryStage::Done).unwrap();
        assert!(ctx.advance(QueryStage::Failed).is_err());
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let (embedder, ingested) = fixture().await;
        let completion = Recorder::answering("Two sales.");
        let outcome = orchestrator(&ingested, &embedder, &completion)
            .run("Taj Mall Abdoun Return")
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Two sales.");
        assert_eq!(outcome.sources.len(), 2);
        assert_eq!(outcome.sources[0].record_id, "2");
        assert_eq!(outcome.context_records, 2);
        assert_eq!(
            outcome.stages,
            vec![
                QueryStage::Idle,
                QueryStage::ValidatingInput,
                QueryStage::EmbeddingQuestion,
                QueryStage::Searching,
                QueryStage::AssemblingContext,
                QueryStage::AwaitingCompletion,
                QueryStage::Done,
            ]
        );

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&ingested.corpus.texts()[1]));
        assert!(prompts[0].ends_with("Question: Taj Mall Abdoun Return\nAnswer:"));
    }

    #[tokio::test]
    async fn test_empty_question_never_embeds() {
        let (embedder, ingested) = fixture().await;
        let completion = Recorder::answering("unused");
        let orchestrator = orchestrator(&ingested, &embedder, &completion);

        for question in ["", "   ", "\n\t"] {
            assert!(matches!(orchestrator.run(question).await, Err(Error::EmptyInput)));
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_validate_question_counts_characters() {
        assert!(validate_question("\u{0645}\u{0648}\u{0644}", 3).is_ok());
        assert!(matches!(validate_question("abcd", 3), Err(Error::InvalidArgument(_))));
        assert!(matches!(validate_question(" \n", 3), Err(Error::EmptyInput)));
    }

    #[tokio::test]
    async fn test_overlong_question_is_rejected() {
        let (embedder, ingested) = fixture().await;
        let completion = Recorder::answering("unused");
        let result = orchestrator(&ingested, &embedder, &completion)
            .run(&"x".repeat(101))
            .await;

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported() {
        let (embedder, ingested) = fixture().await;
        let completion = Recorder::failing(UpstreamError::Server {
            status: 500,
            message: "boom".into(),
        });
        let err = orchestrator(&ingested, &embedder, &completion)
            .run("sales")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "upstream_server_error");
        assert!(err.is_retryable());
    }
}
