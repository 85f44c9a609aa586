use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ReservationPatch;
use crate::model::{format_instant, parse_instant, Ms, Reservation, Span};

use super::error::ApiError;
use super::rooms::RoomView;
use super::{AppState, Body, Operator, PageParams};

#[derive(Debug, Serialize)]
pub struct ReservationView {
    pub id: Uuid,
    pub client: Uuid,
    pub room: Uuid,
    pub start_date: String,
    pub end_date: String,
}

impl From<Reservation> for ReservationView {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            client: r.client_id,
            room: r.room_id,
            start_date: format_instant(r.span.start),
            end_date: format_instant(r.span.end),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReservation {
    pub client: Uuid,
    pub room: Uuid,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchReservation {
    pub client: Option<Uuid>,
    pub room: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn parse_field(value: &str, field: &str) -> Result<Ms, ApiError> {
    parse_instant(value).ok_or_else(|| ApiError::field(field, "enter a valid date/time"))
}

pub async fn list(
    _op: Operator,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Vec<ReservationView>> {
    let reservations = state
        .engine
        .list_reservations(params.to_page(&state.config))
        .await;
    Json(reservations.into_iter().map(ReservationView::from).collect())
}

pub async fn create(
    _op: Operator,
    State(state): State<AppState>,
    Body(req): Body<CreateReservation>,
) -> Result<(StatusCode, Json<ReservationView>), ApiError> {
    let span = Span {
        start: parse_field(&req.start_date, "start_date")?,
        end: parse_field(&req.end_date, "end_date")?,
    };
    let reservation = state
        .engine
        .create_reservation(req.client, req.room, span)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

pub async fn retrieve(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationView>, ApiError> {
    Ok(Json(state.engine.get_reservation(id).await?.into()))
}

pub async fn update(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(req): Body<PatchReservation>,
) -> Result<Json<ReservationView>, ApiError> {
    let start = req
        .start_date
        .as_deref()
        .map(|v| parse_field(v, "start_date"))
        .transpose()?;
    let end = req
        .end_date
        .as_deref()
        .map(|v| parse_field(v, "end_date"))
        .transpose()?;
    let reservation = state
        .engine
        .update_reservation(
            id,
            ReservationPatch {
                client_id: req.client,
                room_id: req.room,
                start,
                end,
            },
        )
        .await?;
    Ok(Json(reservation.into()))
}

pub async fn destroy(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_reservation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Availability ─────────────────────────────────────────

/// Accepted as query parameters on GET and as a JSON body on POST.
#[derive(Debug, Deserialize, Default)]
pub struct AvailabilityParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub room_standard: Option<Uuid>,
}

async fn resolve(
    state: &AppState,
    params: AvailabilityParams,
) -> Result<Json<Vec<RoomView>>, ApiError> {
    let start = params
        .start_date
        .ok_or_else(|| ApiError::field("start_date", "this field is required"))?;
    let end = params
        .end_date
        .ok_or_else(|| ApiError::field("end_date", "this field is required"))?;
    let rooms = state
        .engine
        .rooms_available(start, end, params.room_standard)
        .await?;
    Ok(Json(rooms.into_iter().map(RoomView::from).collect()))
}

pub async fn available(
    _op: Operator,
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<RoomView>>, ApiError> {
    resolve(&state, params).await
}

pub async fn available_body(
    _op: Operator,
    State(state): State<AppState>,
    Body(params): Body<AvailabilityParams>,
) -> Result<Json<Vec<RoomView>>, ApiError> {
    resolve(&state, params).await
}
