//! HTTP surface: token-authenticated JSON API over the engine.

pub mod error;

mod clients;
mod employees;
mod reservations;
mod rooms;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, MatchedPath, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::auth::{now_ms, Session, SessionStore};
use crate::config::Config;
use crate::engine::{Engine, Page};
use crate::observability;

use error::ApiError;

/// Group an employee must belong to before the API accepts their token.
pub const OPERATOR_GROUP: &str = "IT";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub sessions: Arc<SessionStore>,
    pub config: Config,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/employees/login", axum::routing::post(employees::login))
        .route("/clients", get(clients::list).post(clients::create))
        .route(
            "/clients/{id}",
            get(clients::retrieve)
                .patch(clients::update)
                .delete(clients::destroy),
        )
        .route("/employees", get(employees::list).post(employees::create))
        .route(
            "/employees/{id}",
            get(employees::retrieve)
                .patch(employees::update)
                .delete(employees::destroy),
        )
        .route(
            "/rooms/amenities",
            get(rooms::list_amenities).post(rooms::create_amenity),
        )
        .route(
            "/rooms/amenities/{id}",
            get(rooms::retrieve_amenity)
                .patch(rooms::update_amenity)
                .delete(rooms::destroy_amenity),
        )
        .route(
            "/rooms/room-standards",
            get(rooms::list_standards).post(rooms::create_standard),
        )
        .route(
            "/rooms/room-standards/{id}",
            get(rooms::retrieve_standard)
                .patch(rooms::update_standard)
                .delete(rooms::destroy_standard),
        )
        .route("/rooms", get(rooms::list).post(rooms::create))
        .route(
            "/rooms/{id}",
            get(rooms::retrieve)
                .patch(rooms::update)
                .delete(rooms::destroy),
        )
        .route(
            "/reservations/available",
            get(reservations::available).post(reservations::available_body),
        )
        .route(
            "/reservations",
            get(reservations::list).post(reservations::create),
        )
        .route(
            "/reservations/{id}",
            get(reservations::retrieve)
                .patch(reservations::update)
                .delete(reservations::destroy),
        )
        .layer(axum::middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::counter!(
        observability::REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => response.status().as_u16().to_string(),
    )
    .increment(1);
    metrics::histogram!(
        observability::REQUEST_DURATION_SECONDS,
        "method" => method,
        "path" => path,
    )
    .record(start.elapsed().as_secs_f64());
    response
}

/// An authenticated member of the operator group, extracted from the
/// `Authorization: Token <hex>` header. Anything short of that is a 401.
pub struct Operator {
    pub session: Session,
}

impl FromRequestParts<AppState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Token "))
            .ok_or_else(|| {
                metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
                ApiError::Unauthorized("authentication credentials were not provided")
            })?;

        let session = state.sessions.authenticate(token, now_ms()).ok_or_else(|| {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            ApiError::Unauthorized("invalid or expired token")
        })?;

        if !session.groups.iter().any(|g| g == OPERATOR_GROUP) {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            return Err(ApiError::Unauthorized(
                "you do not have permission to perform this action",
            ));
        }

        Ok(Operator { session })
    }
}

/// JSON body extractor whose rejection matches the API's validation
/// error shape instead of axum's plain-text default.
pub struct Body<T>(pub T);

impl<T: DeserializeOwned> FromRequest<AppState> for Body<T> {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::field("non_field_errors", e.body_text()))?;
        Ok(Body(value))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct PageParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageParams {
    pub fn to_page(&self, config: &Config) -> Page {
        Page {
            number: self.page.unwrap_or(1).max(1),
            size: self
                .page_size
                .unwrap_or(config.page_size)
                .clamp(1, config.max_page_size),
        }
    }
}

/// Fields that accept an explicit `null` in PATCH bodies deserialize to
/// `Some(None)`, while an absent key stays `None`.
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
