use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse as _, Response};
use axum::Json;

use crate::ApiState;

/// Responds with the number of entries in the new table
pub async fn handler(State(state): State<Arc<ApiState>>) -> Response {
    match state.reload_targets().await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            tracing::debug!("Error while reloading targets: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)).into_response()
        }
    }
}
