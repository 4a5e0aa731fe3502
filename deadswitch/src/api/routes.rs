//! Route handlers for the `/api/v1` surface in §6.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::auth::Principal;
use crate::validation::{self, SwitchPayload};

#[derive(Serialize)]
pub struct AuthConfigResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

pub async fn auth_config(State(state): State<AppState>) -> Json<AuthConfigResponse> {
    Json(AuthConfigResponse {
        enabled: state.auth.is_enabled(),
        issuer_url: state.auth_issuer_url.map(|s| s.to_string()),
        audience: state.auth_audience.map(|s| s.to_string()),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::error!("health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "failed" }))
        }
    }
}

pub async fn vapid_public_key(State(state): State<AppState>) -> String {
    state.vapid_public_key.to_string()
}

pub async fn create_switch(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Json(payload): Json<SwitchPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let validated = validation::validate(payload, &state.notifiers)?;
    let sw = state.service.create(&principal, validated).await?;
    Ok((StatusCode::CREATED, Json(sw)))
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    -1
}

pub async fn list_switches(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let switches = state.service.list(&principal, params.limit).await?;
    Ok(Json(switches))
}

pub async fn get_switch(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let sw = state.service.get(&principal, id).await?;
    Ok(Json(sw))
}

pub async fn update_switch(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<i64>,
    Json(payload): Json<SwitchPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let validated = validation::validate(payload, &state.notifiers)?;
    let sw = state.service.update(&principal, id, validated).await?;
    Ok(Json(sw))
}

pub async fn delete_switch(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.delete(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_switch(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let sw = state.service.reset(&principal, id).await?;
    Ok(Json(sw))
}

pub async fn disable_switch(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let sw = state.service.disable(&principal, id).await?;
    Ok(Json(sw))
}
