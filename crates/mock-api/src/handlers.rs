//! Axum handlers for the mock REST surface.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;

use expensa_models::{
    AuthenticationResponse, CreateExpenseRequest, Expense, ExpenseId, ExpenseStatus,
    LoginRequest, RegisterRequest, RejectExpenseRequest, TokenRefreshResponse, User, UserId,
};

use crate::error::ApiError;
use crate::state::{MockState, EXPENSE_APPROVE};

type AppState = State<Arc<MockState>>;

// ---------------------------------------------------------------------------
// Bearer authentication
// ---------------------------------------------------------------------------

/// The user behind the request's access token.
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<MockState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<MockState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        state.authenticate(token).map(CurrentUser)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// `POST /auth/register`
pub async fn register(
    State(state): AppState,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthenticationResponse>), ApiError> {
    let response = state.register(&req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /auth/login`
pub async fn login(
    State(state): AppState,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthenticationResponse>, ApiError> {
    state.login(&req).map(Json)
}

/// `POST /auth/refresh` with the refresh token as bearer.
pub async fn refresh(
    State(state): AppState,
    headers: HeaderMap,
) -> Result<Json<TokenRefreshResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let pair = state.refresh(token)?;
    Ok(Json(TokenRefreshResponse::from(pair)))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// `GET /users`
pub async fn list_users(State(state): AppState, _user: CurrentUser) -> Json<Vec<User>> {
    Json(state.users())
}

/// `GET /users/{id}`
pub async fn get_user(
    State(state): AppState,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    state.user(&UserId::from(id)).map(Json)
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

/// `GET /expenses`
pub async fn list_expenses(State(state): AppState, _user: CurrentUser) -> Json<Vec<Expense>> {
    Json(state.expenses())
}

/// `GET /expenses/status/{status}`
pub async fn expenses_by_status(
    State(state): AppState,
    _user: CurrentUser,
    Path(status): Path<String>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let status = ExpenseStatus::from_str(&status)
        .map_err(|_| ApiError::NotFound(format!("expense status {status}")))?;
    Ok(Json(
        state
            .expenses()
            .into_iter()
            .filter(|e| e.status == status)
            .collect(),
    ))
}

/// `GET /expenses/pending-approvals`
pub async fn pending_approvals(
    State(state): AppState,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Expense>>, ApiError> {
    if !user.has_permission(EXPENSE_APPROVE) {
        return Err(ApiError::Forbidden(format!(
            "missing permission {EXPENSE_APPROVE}"
        )));
    }
    Ok(Json(
        state
            .expenses()
            .into_iter()
            .filter(|e| e.status == ExpenseStatus::Submitted)
            .collect(),
    ))
}

/// `POST /expenses`
pub async fn create_expense(
    State(state): AppState,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let expense = state.create_expense(&user, req)?;
    tracing::info!(id = %expense.id, submitter = %user.username, "expense created");
    Ok((StatusCode::CREATED, Json(expense)))
}

/// `GET /expenses/{id}`
pub async fn get_expense(
    State(state): AppState,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Expense>, ApiError> {
    state.expense(&ExpenseId::from(id)).map(Json)
}

/// `DELETE /expenses/{id}`
pub async fn delete_expense(
    State(state): AppState,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.delete_expense(&user, &ExpenseId::from(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /expenses/{id}/submit`
pub async fn submit_expense(
    State(state): AppState,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Expense>, ApiError> {
    state.submit_expense(&user, &ExpenseId::from(id)).map(Json)
}

/// `POST /expenses/{id}/approve`
pub async fn approve_expense(
    State(state): AppState,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Expense>, ApiError> {
    let expense = state.approve_expense(&user, &ExpenseId::from(id))?;
    tracing::info!(id = %expense.id, approver = %user.username, "expense approved");
    Ok(Json(expense))
}

/// `POST /expenses/{id}/reject`
pub async fn reject_expense(
    State(state): AppState,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<RejectExpenseRequest>,
) -> Result<Json<Expense>, ApiError> {
    let expense = state.reject_expense(&user, &ExpenseId::from(id), &req.reason)?;
    tracing::info!(id = %expense.id, approver = %user.username, "expense rejected");
    Ok(Json(expense))
}
