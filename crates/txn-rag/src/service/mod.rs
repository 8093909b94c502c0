//! The query service: an immutable snapshot of the ingested corpus plus the
//! providers needed to answer questions about it

pub mod orchestrator;

use std::sync::Arc;

use crate::config::{RagConfig, RetrievalConfig};
use crate::embeddings::{self, Embedder, SharedEmbedder};
use crate::error::Result;
use crate::generation::{CompletionProvider, OpenAiClient, RetryPolicy};
use crate::index::{FlatIndex, VectorIndex};
use crate::ingestion::{IngestPipeline, IngestedCorpus, RecordLoader};
use crate::retrieval::{ContextAssembler, Corpus};

pub use orchestrator::{
    validate_question, QueryContext, QueryOrchestrator, QueryOutcome, QueryStage,
};

/// Shared, read-only query service
pub struct RagService {
    corpus: Corpus,
    index: FlatIndex,
    embedder: SharedEmbedder,
    completion: Arc<dyn CompletionProvider>,
    assembler: ContextAssembler,
    retry: RetryPolicy,
    top_k: usize,
    max_question_chars: usize,
}

impl RagService {
    pub fn new(
        ingested: IngestedCorpus,
        embedder: SharedEmbedder,
        completion: Arc<dyn CompletionProvider>,
        retrieval: &RetrievalConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            corpus: ingested.corpus,
            index: ingested.index,
            embedder,
            completion,
            assembler: ContextAssembler::new(retrieval.max_context_chars),
            retry,
            top_k: retrieval.top_k,
            max_question_chars: retrieval.max_question_chars,
        }
    }

    /// Load the data source, build the embedder and completion client, and
    /// ingest every record. Any failure here is fatal to startup.
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        let records = RecordLoader::from_config(&config.data)?.load_path(&config.data.path)?;

        let embedder = embeddings::from_config(&config.embeddings).await?;
        if !embedder.health_check().await.unwrap_or(false) {
            tracing::warn!("Embedding backend {} failed its health check", embedder.name());
        }

        let completion: Arc<dyn CompletionProvider> = Arc::new(OpenAiClient::new(&config.llm)?);
        let ingested = IngestPipeline::new(&embedder).run(records).await?;

        if ingested.index.is_empty() {
            tracing::warn!("Corpus is empty; every query will fail until data is provided");
        }

        Ok(Self::new(
            ingested,
            embedder,
            completion,
            &config.retrieval,
            RetryPolicy::from_config(&config.llm),
        ))
    }

    /// Answer one question
    pub async fn answer(&self, question: &str) -> Result<QueryOutcome> {
        self.orchestrator().run(question).await
    }

    fn orchestrator(&self) -> QueryOrchestrator<'_> {
        QueryOrchestrator {
            corpus: &self.corpus,
            index: &self.index,
            embedder: &self.embedder,
            completion: self.completion.as_ref(),
            assembler: self.assembler,
            retry: self.retry,
            top_k: self.top_k,
            max_question_chars: self.max_question_chars,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }

    pub fn completion(&self) -> &dyn CompletionProvider {
        self.completion.as_ref()
    }
}

impl std::fmt::Debug for RagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagService")
            .field("records", &self.corpus.len())
            .field("dimensions", &self.index.dimensions())
            .field("embedder", &self.embedder.name())
            .field("completion", &self.completion.model())
            .field("top_k", &self.top_k)
            .finish()
    }
}
