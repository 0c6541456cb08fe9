use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::rag::AnswerResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub query: String,
}

/// `POST /ask` and `POST /api/ask`.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let span = tracing::info_span!("ask", request_id = %Uuid::new_v4());
    let result = state
        .orchestrator
        .answer(&request.query)
        .instrument(span)
        .await?;

    Ok(Json(result))
}
