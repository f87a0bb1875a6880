use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use super::ApiState;
use crate::handlers::{delete_targets, get_targets, get_throttle_logs, health_check, modify_target, reload_targets};

pub fn get_router(state: ApiState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .route("/", get(health_check))
        .route("/targets", get(get_targets).post(modify_target).delete(delete_targets))
        .route("/targets/reload", post(reload_targets))
        .route("/throttle_logs", get(get_throttle_logs))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([CONTENT_TYPE])
                .allow_origin(Any),
        )
        .with_state(state)
}
