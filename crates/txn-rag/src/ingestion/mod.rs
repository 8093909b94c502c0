//! Record loading, normalization and index construction

pub mod loader;
pub mod normalizer;
pub mod pipeline;

pub use loader::RecordLoader;
pub use normalizer::{normalize, FIELD_SEPARATOR};
pub use pipeline::{IngestPipeline, IngestedCorpus};
