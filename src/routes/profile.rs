//! Profile route definitions

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{delete_profile, get_profile, get_user, upsert_profile};
use crate::state::AppState;

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/profile",
            post(upsert_profile).get(get_profile).delete(delete_profile),
        )
        .route("/api/users/:id", get(get_user))
}
