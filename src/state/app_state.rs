//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::debt::DebtService;
use crate::identity::ProfileService;
use crate::payment::PaymentService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub debt_service: Arc<DebtService>,
    pub payment_service: Arc<PaymentService>,
    pub profile_service: Arc<ProfileService>,
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(
        debt_service: Arc<DebtService>,
        payment_service: Arc<PaymentService>,
        profile_service: Arc<ProfileService>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            debt_service,
            payment_service,
            profile_service,
            webhook_secret,
        }
    }
}

impl FromRef<AppState> for Arc<DebtService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.debt_service.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_service.clone()
    }
}

impl FromRef<AppState> for Arc<ProfileService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.profile_service.clone()
    }
}
