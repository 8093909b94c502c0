//! Corpus storage and context assembly for retrieved neighbours

pub mod context;
pub mod corpus;

pub use context::{AssembledContext, ContextAssembler, CONTEXT_SEPARATOR};
pub use corpus::Corpus;
