use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, now_ms, verify_password};
use crate::engine::EmployeePatch;
use crate::limits::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::model::{format_instant, Employee};
use crate::observability;

use super::error::ApiError;
use super::{double_option, AppState, Body, Operator, PageParams};

/// What the API shows for an employee. The password hash never leaves
/// the process.
#[derive(Debug, Serialize)]
pub struct EmployeeView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub department: String,
    pub hire_date: Option<NaiveDate>,
    pub date_of_termination: Option<NaiveDate>,
    pub groups: Vec<String>,
}

impl From<Employee> for EmployeeView {
    fn from(e: Employee) -> Self {
        Self {
            id: e.id,
            username: e.username,
            email: e.email,
            first_name: e.first_name,
            last_name: e.last_name,
            position: e.position,
            department: e.department,
            hire_date: e.hire_date,
            date_of_termination: e.date_of_termination,
            groups: e.groups,
        }
    }
}

// ── Login ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub employee: EmployeeView,
}

pub async fn login(
    State(state): State<AppState>,
    Body(req): Body<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let denied = || {
        metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
        ApiError::Unauthorized("invalid username or password")
    };

    let employee = state
        .engine
        .get_employee_by_username(&req.username)
        .ok_or_else(denied)?;
    if !verify_password(&req.password, &employee.password_hash) {
        return Err(denied());
    }
    if employee.is_terminated(Utc::now().date_naive()) {
        return Err(denied());
    }

    let session = state.sessions.issue(&employee, now_ms());
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: format_instant(session.expires_at),
        employee: employee.into(),
    }))
}

// ── CRUD ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateEmployee {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub department: String,
    pub hire_date: Option<NaiveDate>,
    pub date_of_termination: Option<NaiveDate>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchEmployee {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub hire_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub date_of_termination: Option<Option<NaiveDate>>,
    pub groups: Option<Vec<String>>,
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::field("password", "password is too short"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::field("password", "password is too long"));
    }
    Ok(())
}

pub async fn list(
    _op: Operator,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Vec<EmployeeView>> {
    let employees = state.engine.list_employees(params.to_page(&state.config));
    Json(employees.into_iter().map(EmployeeView::from).collect())
}

pub async fn create(
    _op: Operator,
    State(state): State<AppState>,
    Body(req): Body<CreateEmployee>,
) -> Result<(StatusCode, Json<EmployeeView>), ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::field("username", "this field may not be blank"));
    }
    check_password(&req.password)?;
    let employee = state
        .engine
        .create_employee(
            req.username,
            hash_password(&req.password),
            req.email,
            req.first_name,
            req.last_name,
            req.position,
            req.department,
            req.hire_date,
            req.date_of_termination,
            req.groups,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(employee.into())))
}

pub async fn retrieve(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmployeeView>, ApiError> {
    Ok(Json(state.engine.get_employee(id)?.into()))
}

pub async fn update(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Body(req): Body<PatchEmployee>,
) -> Result<Json<EmployeeView>, ApiError> {
    let password_hash = match &req.password {
        Some(password) => {
            check_password(password)?;
            Some(hash_password(password))
        }
        None => None,
    };
    let employee = state
        .engine
        .update_employee(
            id,
            EmployeePatch {
                username: req.username,
                password_hash,
                email: req.email,
                first_name: req.first_name,
                last_name: req.last_name,
                position: req.position,
                department: req.department,
                hire_date: req.hire_date,
                date_of_termination: req.date_of_termination,
                groups: req.groups,
            },
        )
        .await?;
    // A termination date set in the past cuts off existing sessions too.
    if employee.is_terminated(Utc::now().date_naive()) {
        state.sessions.revoke_employee(id);
    }
    Ok(Json(employee.into()))
}

pub async fn destroy(
    _op: Operator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_employee(id).await?;
    state.sessions.revoke_employee(id);
    Ok(StatusCode::NO_CONTENT)
}
