//! Debt route definitions

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{
    create_debt, delete_debt, get_debt, list_debts, mark_defaulted, send_reminder, update_debt,
};
use crate::state::AppState;

pub fn debt_routes() -> Router<AppState> {
    Router::new()
        .route("/api/debts", post(create_debt).get(list_debts))
        .route(
            "/api/debts/:id",
            get(get_debt).put(update_debt).delete(delete_debt),
        )
        .route("/api/debts/:id/default", post(mark_defaulted))
        .route("/api/debts/:id/remind", post(send_reminder))
}
