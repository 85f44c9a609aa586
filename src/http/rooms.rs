use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{AmenityPatch, CategoryPatch, RoomPatch};
use crate::model::{Amenity, Room, RoomCategory};

use super::error::ApiError;
use super::{AppState, Body, Operator, PageParams};

/// Rooms reference their standard as `room_standard` on the wire.
#[derive(Debug, Serialize)]
pub struct RoomView {
    pub id: Uuid,
    pub number: String,
    pub room_standard: Uuid,
    pub is_available: bool,
    pub location: String,
}

impl From<Room> for RoomView {
    fn from(r: Room) -> Self {
        Self {
            id: r.id,
            number: r.number,
            room_standard: r.category_id,
            is_available: r.is_available,
            location: r.location,
        }
    }
}

// ── Amenities ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateAmenity {
    pub name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchAmenity {
    pub name: Option<String>,
}

pub async fn list_amenities(
    _op: Operator,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Vec<Amenity>> {
    Json(state.engine.list_amenities(params.to_page(&state.config)))
}

pub async fn create_amenity(
    _op: Operator,
    State(state): State<AppState>,
    Body(req): Body<CreateAmenity>,
) -> Result<(StatusCode, Json<Amenity>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::field("name", "this field may not be blank"));
    }
    let amenity = state.engine.create_amenity(req.name).await?;
    Ok((StatusCode::CREATED, Json(amenity)))
}

pub async fn retrieve_amenity(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Amenity>, ApiError> {
    Ok(Json(state.engine.get_amenity(id)?))
}

pub async fn update_amenity(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(req): Body<PatchAmenity>,
) -> Result<Json<Amenity>, ApiError> {
    let amenity = state
        .engine
        .update_amenity(id, AmenityPatch { name: req.name })
        .await?;
    Ok(Json(amenity))
}

pub async fn destroy_amenity(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_amenity(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Room standards ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateStandard {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Nightly price in minor currency units.
    pub price_per_night: i64,
    #[serde(default)]
    pub amenities: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchStandard {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_per_night: Option<i64>,
    pub amenities: Option<Vec<Uuid>>,
}

pub async fn list_standards(
    _op: Operator,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Vec<RoomCategory>> {
    Json(state.engine.list_categories(params.to_page(&state.config)))
}

pub async fn create_standard(
    _op: Operator,
    State(state): State<AppState>,
    Body(req): Body<CreateStandard>,
) -> Result<(StatusCode, Json<RoomCategory>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::field("name", "this field may not be blank"));
    }
    let standard = state
        .engine
        .create_category(req.name, req.description, req.price_per_night, req.amenities)
        .await?;
    Ok((StatusCode::CREATED, Json(standard)))
}

pub async fn retrieve_standard(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomCategory>, ApiError> {
    Ok(Json(state.engine.get_category(id)?))
}

pub async fn update_standard(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(req): Body<PatchStandard>,
) -> Result<Json<RoomCategory>, ApiError> {
    let standard = state
        .engine
        .update_category(
            id,
            CategoryPatch {
                name: req.name,
                description: req.description,
                price_per_night: req.price_per_night,
                amenities: req.amenities,
            },
        )
        .await?;
    Ok(Json(standard))
}

pub async fn destroy_standard(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Rooms ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateRoom {
    pub number: String,
    pub room_standard: Uuid,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub location: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchRoom {
    pub number: Option<String>,
    pub room_standard: Option<Uuid>,
    pub is_available: Option<bool>,
    pub location: Option<String>,
}

pub async fn list(
    _op: Operator,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Vec<RoomView>> {
    let rooms = state.engine.list_rooms(params.to_page(&state.config)).await;
    Json(rooms.into_iter().map(RoomView::from).collect())
}

pub async fn create(
    _op: Operator,
    State(state): State<AppState>,
    Body(req): Body<CreateRoom>,
) -> Result<(StatusCode, Json<RoomView>), ApiError> {
    if req.number.trim().is_empty() {
        return Err(ApiError::field("number", "this field may not be blank"));
    }
    let room = state
        .engine
        .create_room(req.number, req.room_standard, req.is_available, req.location)
        .await?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

pub async fn retrieve(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomView>, ApiError> {
    Ok(Json(state.engine.get_room(id).await?.into()))
}

pub async fn update(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(req): Body<PatchRoom>,
) -> Result<Json<RoomView>, ApiError> {
    let room = state
        .engine
        .update_room(
            id,
            RoomPatch {
                number: req.number,
                category_id: req.room_standard,
                is_available: req.is_available,
                location: req.location,
            },
        )
        .await?;
    Ok(Json(room.into()))
}

pub async fn destroy(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_room(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
