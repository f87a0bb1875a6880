use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse as _, Response};
use axum::Json;
use guardian_ns_db::Target;

use crate::ApiState;

/// Deletes targets by id and reloads the server's table. Responds with the deleted targets
pub async fn handler(State(state): State<Arc<ApiState>>, Json(ids): Json<Vec<u32>>) -> Response {
    match delete_targets_handler(&state, &ids).await {
        Ok(deleted) => Json(deleted).into_response(),
        Err(e) => {
            tracing::debug!(ids = ?ids, "Error while deleting targets: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn delete_targets_handler(state: &ApiState, ids: &[u32]) -> anyhow::Result<Vec<Target>> {
    let deleted = {
        let mut connection = state.db.get_connection().await?;
        Target::delete_by_ids(&mut connection, ids).await?
    };

    if !deleted.is_empty() {
        state.reload_targets().await?;
    }

    Ok(deleted)
}
