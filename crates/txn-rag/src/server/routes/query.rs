//! Query endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::service::validate_question;
use crate::types::{QueryRequest, QueryResponse};

/// POST /api/query - Answer a question about the transactions
pub async fn query_rag(
    State(state): State<AppState>,
    request: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    let Json(request) =
        request.map_err(|rejection| Error::invalid_argument(rejection.body_text()))?;

    validate_question(
        request.question(),
        state.config().retrieval.max_question_chars,
    )?;

    let service = state.service()?;
    let _permit = state.admission().admit().await?;

    tracing::info!("Query: \"{}\"", request.question());

    let outcome = service.answer(request.question()).await?;

    Ok(Json(QueryResponse {
        answer: outcome.answer,
        sources: request.include_sources.then_some(outcome.sources),
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
