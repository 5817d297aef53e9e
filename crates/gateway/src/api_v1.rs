//! JSON query API.
//!
//! `POST /v1/query` with `{"prompt": "...", "session_id": "..."}`. Omitting
//! `session_id` starts a new session; the response always names the
//! session so clients can continue it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use unitypilot_core::message::SessionId;

use crate::GatewayState;
use crate::frontend::{PROMPT_REQUIRED, QUERY_FAILED};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub prompt: String,

    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

pub async fn query_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, PROMPT_REQUIRED));
    }

    let session = match request.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => SessionId::from(id),
        _ => SessionId::new(),
    };
    info!(session_id = %session, prompt_len = prompt.len(), "API query received");

    match state.runner.run_query(Some(&session), prompt).await {
        Ok(answer) => Ok(Json(QueryResponse {
            answer,
            session_id: session.0,
        })),
        Err(e) => {
            error!(session_id = %session, error = %e, "API query failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, QUERY_FAILED))
        }
    }
}
