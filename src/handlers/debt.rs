//! Debt-related API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::debt::{CreateDebtRequest, DebtResponse, ListDebtsQuery, UpdateDebtRequest};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

/// Create a new debt
pub async fn create_debt(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<CreateDebtRequest>,
) -> ApiResult<(StatusCode, Json<DebtResponse>)> {
    let debt = app_state
        .debt_service
        .create_debt(caller.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(debt.into())))
}

/// List the caller's debts
pub async fn list_debts(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Query(query): Query<ListDebtsQuery>,
) -> ApiResult<Json<Vec<DebtResponse>>> {
    let debts = app_state
        .debt_service
        .list_debts(caller.user_id, query.status)
        .await?;
    Ok(Json(debts.into_iter().map(Into::into).collect()))
}

/// Get a single debt by ID
pub async fn get_debt(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Path(debt_id): Path<Uuid>,
) -> ApiResult<Json<DebtResponse>> {
    let debt = app_state
        .debt_service
        .get_debt(debt_id, caller.user_id)
        .await?;
    Ok(Json(debt.into()))
}

/// Edit a debt
pub async fn update_debt(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Path(debt_id): Path<Uuid>,
    Json(request): Json<UpdateDebtRequest>,
) -> ApiResult<Json<DebtResponse>> {
    let debt = app_state
        .debt_service
        .edit_debt(debt_id, caller.user_id, request)
        .await?;
    Ok(Json(debt.into()))
}

/// Delete a debt and its payments
pub async fn delete_debt(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Path(debt_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    app_state
        .debt_service
        .delete_debt(debt_id, caller.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a debt as uncollectible
pub async fn mark_defaulted(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Path(debt_id): Path<Uuid>,
) -> ApiResult<Json<DebtResponse>> {
    let debt = app_state
        .debt_service
        .mark_defaulted(debt_id, caller.user_id)
        .await?;
    Ok(Json(debt.into()))
}

/// Send a payment reminder to the debtor
pub async fn send_reminder(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Path(debt_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    app_state
        .debt_service
        .send_reminder(debt_id, caller.user_id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}
