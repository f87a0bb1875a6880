use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use guardian_ns_common::validate_target;
use guardian_ns_db::Target;
use serde::{Deserialize, Serialize};

use super::{ValidatableRequest, ValidatedJson};
use crate::ApiState;

#[derive(Debug, Deserialize)]
pub struct RawTargetRequest {
    pub domain: String,
    pub address: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ModifyTargetRequest {
    /// Normalized
    pub domain: String,
    pub address: Ipv4Addr,
}

impl ValidatableRequest for ModifyTargetRequest {
    type Raw = RawTargetRequest;

    fn validate(raw: Self::Raw) -> anyhow::Result<Self> {
        let (domain, address) = validate_target(&raw.domain, &raw.address)?;
        Ok(ModifyTargetRequest { domain, address })
    }
}

#[derive(Debug, Serialize)]
pub struct ModifyTargetResponse {
    pub id: u32,
    /// Number of entries in the reloaded table
    pub targets: usize,
}

/// Adds a target or replaces the address of an existing one, then reloads the server's table
pub async fn handler(
    State(state): State<Arc<ApiState>>,
    ValidatedJson(request): ValidatedJson<ModifyTargetRequest>,
) -> Response {
    match process_request(&state, request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::debug!("Error while modifying a target: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)).into_response()
        }
    }
}

async fn process_request(state: &ApiState, request: ModifyTargetRequest) -> anyhow::Result<ModifyTargetResponse> {
    let id = {
        let mut connection = state.db.get_connection().await?;
        Target::new(&request.domain, request.address.to_string())?
            .upsert(&mut connection)
            .await?
    };

    let targets = state.reload_targets().await?;

    Ok(ModifyTargetResponse { id, targets })
}
