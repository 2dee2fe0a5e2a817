//! Payment models for the Tally backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Gateway name used for lender-recorded cash or transfer entries.
pub const MANUAL_GATEWAY: &str = "manual";

/// Payment status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

/// Payment model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub debt_id: Uuid,
    pub amount: i64,
    pub status: PaymentStatus,
    /// Unique idempotency key; a reference is applied to the debt at most once.
    pub reference: String,
    pub gateway: String,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to record a manual payment against a debt
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Request to open a gateway payment for a debt
#[derive(Debug, Deserialize, Validate)]
pub struct InitiatePaymentRequest {
    pub debt_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(min = 1, max = 64))]
    pub gateway: String,
}

/// Gateway callback payload
///
/// `debt_id` is only needed when the gateway reports a reference this service
/// has never recorded (a lost initiate); a known reference is settled in place.
#[derive(Debug, Deserialize)]
pub struct GatewayCallback {
    pub reference: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub gateway: Option<String>,
    pub debt_id: Option<Uuid>,
}
