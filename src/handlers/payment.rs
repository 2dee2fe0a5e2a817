//! Payment-related API handlers

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::payment::{
    GatewayCallback, InitiatePaymentRequest, Payment, RecordPaymentRequest,
};
use crate::state::AppState;

/// Record a manual payment against a debt
pub async fn record_payment(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Path(debt_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let payment = app_state
        .payment_service
        .record_payment(debt_id, caller.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// List a debt's payments
pub async fn list_payments(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Path(debt_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Payment>>> {
    let payments = app_state
        .payment_service
        .list_payments(debt_id, caller.user_id)
        .await?;
    Ok(Json(payments))
}

/// Open a gateway payment for a debt
pub async fn initiate_payment(
    State(app_state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<InitiatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let payment = app_state
        .payment_service
        .initiate_gateway_payment(caller.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Gateway callback endpoint
///
/// The gateway is the only trusted caller; neither party hits this route
/// directly. Fail-closed when no shared secret is configured.
pub async fn gateway_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(callback): Json<GatewayCallback>,
) -> ApiResult<Json<Payment>> {
    verify_webhook_secret(&app_state, &headers)?;

    let payment = app_state
        .payment_service
        .apply_gateway_payment(callback)
        .await?;
    Ok(Json(payment))
}

fn verify_webhook_secret(app_state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    match &app_state.webhook_secret {
        Some(secret) if !secret.is_empty() => {
            let presented = headers
                .get("x-webhook-secret")
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();

            if presented != secret {
                return Err(ApiError::Unauthorized(
                    "Invalid webhook secret".to_string(),
                ));
            }
            Ok(())
        }
        _ => {
            tracing::error!("Webhook secret not configured - rejecting gateway callback");
            Err(ApiError::ServiceUnavailable(
                "Webhook endpoint is not configured".to_string(),
            ))
        }
    }
}
