use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::admin::AdminState;
use crate::load_balancer::{self, Backend, BackendError, LoadBalancer};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub load_balancing: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BackendStatus {
    pub address: String,
    pub healthy: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplaceBackends {
    pub backends: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetHealth {
    pub address: String,
    pub healthy: bool,
}

/// Admin API failures.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("load balancing is not enabled")]
    LoadBalancingDisabled,
    #[error(transparent)]
    InvalidAddress(#[from] BackendError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::LoadBalancingDisabled => StatusCode::NOT_FOUND,
            AdminError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

fn balancer(state: &AdminState) -> Result<&Arc<dyn LoadBalancer>, AdminError> {
    state.balancer.as_ref().ok_or(AdminError::LoadBalancingDisabled)
}

fn snapshot(balancer: &dyn LoadBalancer) -> Vec<BackendStatus> {
    balancer
        .backends()
        .iter()
        .map(|b| BackendStatus {
            address: b.address().to_string(),
            healthy: b.is_healthy(),
        })
        .collect()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        load_balancing: state.balancer.is_some(),
    })
}

pub async fn get_backends(
    State(state): State<AdminState>,
) -> Result<Json<Vec<BackendStatus>>, AdminError> {
    let balancer = balancer(&state)?;
    Ok(Json(snapshot(balancer.as_ref())))
}

pub async fn put_backends(
    State(state): State<AdminState>,
    Json(body): Json<ReplaceBackends>,
) -> Result<Json<Vec<BackendStatus>>, AdminError> {
    let balancer = balancer(&state)?;
    let backends = load_balancer::parse_backends(&body.backends)?;
    balancer.update_backends(backends);
    Ok(Json(snapshot(balancer.as_ref())))
}

pub async fn post_health(
    State(state): State<AdminState>,
    Json(body): Json<SetHealth>,
) -> Result<Json<Vec<BackendStatus>>, AdminError> {
    let balancer = balancer(&state)?;
    let backend = Backend::parse(&body.address)?;
    balancer.health_check(&backend, body.healthy);
    Ok(Json(snapshot(balancer.as_ref())))
}
