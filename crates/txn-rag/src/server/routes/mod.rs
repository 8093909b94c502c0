//! API routes for the RAG server

pub mod query;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(query::query_rag))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();

    let corpus = state.service().ok().map(|service| {
        json!({
            "records": service.corpus().len(),
            "dimensions": service.index().dimensions(),
            "index": service.index().name(),
            "embedder": service.embedder().name(),
            "completion_model": service.completion().model(),
        })
    });

    Json(json!({
        "name": "txn-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering over transaction records",
        "ready": corpus.is_some(),
        "corpus": corpus,
        "retrieval": {
            "top_k": config.retrieval.top_k,
            "max_context_chars": config.retrieval.max_context_chars,
        },
        "endpoints": {
            "POST /api/query": "Answer a question about the transactions",
            "POST /query": "Alias of POST /api/query",
            "GET /api/info": "This document",
            "GET /health": "Liveness",
            "GET /ready": "200 once ingestion has completed",
        }
    }))
}
