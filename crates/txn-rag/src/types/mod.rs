//! Core types for the transaction RAG service

pub mod query;
pub mod record;

pub use query::{QueryRequest, QueryResponse, SourceRecord};
pub use record::{TransactionRecord, FIELD_COUNT, FIELD_NAMES};
