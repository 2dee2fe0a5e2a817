//! Profile-related API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::identity::{Identity, ProfileInput, PublicIdentity};
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

/// Create or update the caller's profile
pub async fn upsert_profile(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Json(input): Json<ProfileInput>,
) -> ApiResult<Json<Identity>> {
    let identity = app_state
        .profile_service
        .create_or_update_profile(caller.user_id, input)
        .await?;
    Ok(Json(identity))
}

/// Get the caller's own profile
pub async fn get_profile(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<Json<Identity>> {
    let identity = app_state.profile_service.get_profile(caller.user_id).await?;
    Ok(Json(identity))
}

/// Delete the caller's account
pub async fn delete_profile(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
) -> ApiResult<StatusCode> {
    app_state
        .profile_service
        .delete_profile(caller.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public view of another user
pub async fn get_user(
    State(app_state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<PublicIdentity>> {
    let identity = app_state.profile_service.get_profile(user_id).await?;
    Ok(Json(identity.into()))
}
