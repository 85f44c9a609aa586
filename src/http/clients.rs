use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::ClientPatch;
use crate::model::Client;

use super::error::ApiError;
use super::{AppState, Body, Operator, PageParams};

#[derive(Debug, Deserialize)]
pub struct CreateClient {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchClient {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub async fn list(
    _op: Operator,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Vec<Client>> {
    Json(state.engine.list_clients(params.to_page(&state.config)))
}

pub async fn create(
    _op: Operator,
    State(state): State<AppState>,
    Body(req): Body<CreateClient>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::field("name", "this field may not be blank"));
    }
    if !req.email.contains('@') {
        return Err(ApiError::field("email", "enter a valid email address"));
    }
    let client = state.engine.create_client(req.name, req.email).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn retrieve(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, ApiError> {
    Ok(Json(state.engine.get_client(id)?))
}

pub async fn update(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(req): Body<PatchClient>,
) -> Result<Json<Client>, ApiError> {
    if let Some(name) = &req.name
        && name.trim().is_empty() {
            return Err(ApiError::field("name", "this field may not be blank"));
        }
    if let Some(email) = &req.email
        && !email.contains('@') {
            return Err(ApiError::field("email", "enter a valid email address"));
        }
    let client = state
        .engine
        .update_client(
            id,
            ClientPatch {
                name: req.name,
                email: req.email,
            },
        )
        .await?;
    Ok(Json(client))
}

pub async fn destroy(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_client(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
