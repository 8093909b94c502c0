//! Query request and response types

use serde::{Deserialize, Serialize};

use crate::index::Neighbor;
use crate::retrieval::Corpus;

/// Body of `POST /api/query`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer. A missing field is treated like an empty one.
    #[serde(default)]
    pub question: Option<String>,

    /// Return the retrieved records alongside the answer
    #[serde(default)]
    pub include_sources: bool,
}

impl QueryRequest {
    /// Create a new query
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: Some(question.into()),
            include_sources: false,
        }
    }

    /// Include retrieved records in the response
    pub fn with_sources(mut self) -> Self {
        self.include_sources = true;
        self
    }

    /// The question text, empty when absent
    pub fn question(&self) -> &str {
        self.question.as_deref().unwrap_or("")
    }
}

/// A retrieved record as reported to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    /// Position of the record in the corpus
    pub position: usize,
    /// Record identifier
    pub record_id: String,
    /// Squared Euclidean distance to the question
    pub distance: f32,
    /// Normalized record text
    pub text: String,
}

impl SourceRecord {
    /// Resolve neighbours against the corpus, skipping unknown positions
    pub fn from_neighbors(corpus: &Corpus, neighbors: &[Neighbor]) -> Vec<Self> {
        neighbors
            .iter()
            .filter_map(|n| {
                corpus.get(n.position).map(|(record, text)| Self {
                    position: n.position,
                    record_id: record.id.clone(),
                    distance: n.distance,
                    text: text.to_string(),
                })
            })
            .collect()
    }
}

/// Response of `POST /api/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Answer produced by the completion service
    pub answer: String,
    /// Retrieved records (only when requested)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRecord>>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}
