mod delete_targets;
mod get_targets;
mod get_throttle_logs;
mod modify_target;
mod reload_targets;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
pub use delete_targets::handler as delete_targets;
pub use get_targets::{handler as get_targets, TargetsFilter};
pub use get_throttle_logs::{handler as get_throttle_logs, ThrottleLogsFilter};
pub use modify_target::handler as modify_target;
pub use reload_targets::handler as reload_targets;
use serde::Deserialize;

use crate::ApiState;

pub trait ValidatableRequest: Sized {
    type Raw;

    fn validate(raw: Self::Raw) -> anyhow::Result<Self>;
}

#[derive(Debug)]
pub enum ValidationRejection {
    JsonError(String),
    ValidationError(String),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let message = match self {
            ValidationRejection::JsonError(error) => format!("Error while parsing JSON: {}", error),
            ValidationRejection::ValidationError(error) => format!("Error while validating the input data: {}", error),
        };

        (StatusCode::BAD_REQUEST, message).into_response()
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: ValidatableRequest,
    Json<T::Raw>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<T::Raw>::from_request(req, state)
            .await
            .map_err(|e| ValidationRejection::JsonError(e.to_string()))?;
        Ok(ValidatedJson(
            T::validate(raw).map_err(|e| ValidationRejection::ValidationError(e.to_string()))?,
        ))
    }
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Asc,
    #[default]
    Desc,
}

pub async fn health_check(State(_): State<Arc<ApiState>>) -> &'static str {
    "I'm alive"
}
