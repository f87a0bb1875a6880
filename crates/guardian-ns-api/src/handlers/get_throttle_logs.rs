use std::sync::Arc;

use anyhow::Context as _;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse as _, Response};
use axum::Json;
use guardian_ns_db::{SqliteDb, ThrottleLog};
use serde::Deserialize;

use super::Sort;
use crate::util::build_select_throttle_logs_query_with_filters;
use crate::ApiState;

#[derive(Debug, Deserialize)]
pub struct ThrottleLogsFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub from_timestamp: Option<u32>,
    #[serde(default)]
    pub sort: Sort,
}

pub async fn handler(State(state): State<Arc<ApiState>>, Query(filter): Query<ThrottleLogsFilter>) -> Response {
    let logs = match get_throttle_logs_handler(&state.db, &filter).await {
        Ok(logs) => logs,
        Err(e) => {
            tracing::debug!(filter = ?filter, "Error while getting throttle logs: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(logs).into_response()
}

async fn get_throttle_logs_handler(db: &SqliteDb, filter: &ThrottleLogsFilter) -> anyhow::Result<Vec<ThrottleLog>> {
    let mut query = build_select_throttle_logs_query_with_filters(filter);

    let mut connection = db.get_connection().await?;

    let logs: Vec<ThrottleLog> = query
        .build_query_as()
        .fetch_all(&mut *connection)
        .await
        .context("failed to get data from DB")?;

    Ok(logs)
}

#[cfg(test)]
mod tests {
    use guardian_ns_db::Model as _;

    use super::*;
    use crate::test_utils::get_state;

    #[tokio::test]
    async fn filters_by_timestamp() {
        let state = get_state().await;
        {
            let mut connection = state.db.get_connection().await.expect("shouldn't have failed");
            for (timestamp, client) in [(100, "192.0.2.1"), (200, "192.0.2.2"), (300, "192.0.2.3")] {
                let log = ThrottleLog {
                    id: 0,
                    timestamp,
                    client: client.into(),
                };
                log.insert_into(&mut connection).await.expect("shouldn't have failed");
            }
        }

        let filter = ThrottleLogsFilter {
            limit: None,
            offset: None,
            from_timestamp: Some(200),
            sort: Sort::Desc,
        };
        let logs = get_throttle_logs_handler(&state.db, &filter)
            .await
            .expect("shouldn't have failed");
        let clients: Vec<_> = logs.iter().map(|log| log.client.as_str()).collect();
        assert_eq!(clients, ["192.0.2.3", "192.0.2.2"]);
    }
}
