//! One-shot ingestion: records -> texts -> embeddings -> index

use std::time::Instant;

use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::index::{FlatIndex, VectorIndex};
use crate::retrieval::Corpus;
use crate::types::TransactionRecord;

/// Output of ingestion: the corpus and the index built over it.
/// Position `i` in the index always refers to `corpus.get(i)`.
pub struct IngestedCorpus {
    pub corpus: Corpus,
    pub index: FlatIndex,
}

impl std::fmt::Debug for IngestedCorpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestedCorpus")
            .field("records", &self.corpus.len())
            .field("dimensions", &self.index.dimensions())
            .finish()
    }
}

/// Ingestion pipeline over an embedder
pub struct IngestPipeline<'a> {
    embedder: &'a dyn Embedder,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    /// Normalize, embed and index every record. Any failure aborts ingestion.
    pub async fn run(&self, records: Vec<TransactionRecord>) -> Result<IngestedCorpus> {
        let start = Instant::now();
        let corpus = Corpus::from_records(records);

        tracing::info!(
            "Embedding {} records with {} ({} dimensions)",
            corpus.len(),
            self.embedder.name(),
            self.embedder.dimensions()
        );

        let embeddings = if corpus.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(corpus.texts()).await?
        };

        if embeddings.len() != corpus.len() {
            return Err(Error::embedding(format!(
                "embedder returned {} vectors for {} records",
                embeddings.len(),
                corpus.len()
            )));
        }

        let index = FlatIndex::build(embeddings, self.embedder.dimensions())?;

        tracing::info!(
            "Ingestion complete: {} records indexed in {}ms",
            index.len(),
            start.elapsed().as_millis()
        );

        Ok(IngestedCorpus { corpus, index })
    }
}
