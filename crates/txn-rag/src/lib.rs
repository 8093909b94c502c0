//! txn-rag: question answering over transaction records
//!
//! Records from a delimited file are normalized to text, embedded once at
//! startup and held in an exact L2 index. Each question is embedded, its
//! nearest records are assembled into a bounded context, and an external
//! completion service writes the answer.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result, UpstreamError};
pub use service::{QueryOutcome, RagService};
pub use types::{QueryRequest, QueryResponse, SourceRecord, TransactionRecord};
