//! Payment route definitions

use axum::routing::post;
use axum::Router;

use crate::handlers::{gateway_webhook, initiate_payment, list_payments, record_payment};
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/debts/:id/payments",
            post(record_payment).get(list_payments),
        )
        .route("/api/payments/initiate", post(initiate_payment))
        .route("/api/payments/webhook", post(gateway_webhook))
}
