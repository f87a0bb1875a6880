use std::sync::Arc;

use anyhow::Context as _;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse as _, Response};
use axum::Json;
use guardian_ns_db::{SqliteDb, Target};
use serde::Deserialize;

use super::Sort;
use crate::util::build_select_targets_query_with_filters;
use crate::ApiState;

#[derive(Debug, Deserialize)]
pub struct TargetsFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    #[serde(default)]
    pub sort: Sort,
}

pub async fn handler(State(state): State<Arc<ApiState>>, Query(filter): Query<TargetsFilter>) -> Response {
    match get_targets_handler(&state.db, &filter).await {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => {
            tracing::debug!(filter = ?filter, "Error while getting targets: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_targets_handler(db: &SqliteDb, filter: &TargetsFilter) -> anyhow::Result<Vec<Target>> {
    let mut query = build_select_targets_query_with_filters(filter);

    let mut connection = db.get_connection().await?;

    query
        .build_query_as()
        .fetch_all(&mut *connection)
        .await
        .context("failed to get targets from DB")
}
