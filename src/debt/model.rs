//! Debt models for the Tally backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Debt status enum
///
/// `Overdue` is a read-time classification of a pending debt past its due
/// date; it is declared in the schema but never written to a row.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "debt_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum DebtStatus {
    Pending,
    Paid,
    Overdue,
    Defaulted,
}

/// Debt model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Debt {
    pub id: Uuid,
    pub lender_id: Uuid,
    pub debtor_id: Option<Uuid>,
    /// Canonical form; the durable matching key independent of `debtor_id`.
    pub debtor_phone_number: String,
    pub principal_amount: i64,
    pub interest_rate: f64,
    pub calculated_interest: i64,
    pub total_amount: i64,
    pub outstanding_balance: i64,
    pub due_date: DateTime<Utc>,
    pub status: DebtStatus,
    pub notes: Option<String>,
    pub is_external: bool,
    pub external_lender_name: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    /// Status as seen by callers: a pending debt past its due date reads as
    /// overdue without a persisted transition.
    pub fn effective_status(&self, now: DateTime<Utc>) -> DebtStatus {
        if self.status == DebtStatus::Pending && self.due_date < now {
            DebtStatus::Overdue
        } else {
            self.status
        }
    }
}

/// Flat interest charged on a principal at the given percentage rate.
///
/// The rate is not annualized or weighted by elapsed time; it is applied once
/// at creation (and recomputed on edit).
pub fn calculate_interest(principal: i64, rate: f64) -> i64 {
    (principal as f64 * rate / 100.0).round() as i64
}

/// Request to create a new debt
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDebtRequest {
    pub debtor_phone_number: String,
    #[validate(range(min = 1))]
    pub principal_amount: i64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub interest_rate: f64,
    pub due_date: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Recorded on behalf of a third party ("I owe my landlord").
    #[serde(default)]
    pub is_external: bool,
    #[validate(length(min = 1, max = 120))]
    pub external_lender_name: Option<String>,
}

/// Request to edit an existing debt
///
/// Omitted fields are left untouched. Principal, rate, and phone are only
/// editable while the debt is pending.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDebtRequest {
    pub debtor_phone_number: Option<String>,
    #[validate(range(min = 1))]
    pub principal_amount: Option<i64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub interest_rate: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub external_lender_name: Option<String>,
}

/// Query for listing debts
#[derive(Debug, Deserialize)]
pub struct ListDebtsQuery {
    pub status: Option<DebtStatus>,
}

/// Debt as returned by the API, with the read-time status overlay applied
#[derive(Debug, Serialize)]
pub struct DebtResponse {
    pub id: Uuid,
    pub lender_id: Uuid,
    pub debtor_id: Option<Uuid>,
    pub debtor_phone_number: String,
    pub principal_amount: i64,
    pub interest_rate: f64,
    pub calculated_interest: i64,
    pub total_amount: i64,
    pub outstanding_balance: i64,
    pub due_date: DateTime<Utc>,
    pub status: DebtStatus,
    pub notes: Option<String>,
    pub is_external: bool,
    pub external_lender_name: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Debt> for DebtResponse {
    fn from(debt: Debt) -> Self {
        let status = debt.effective_status(Utc::now());
        Self {
            id: debt.id,
            lender_id: debt.lender_id,
            debtor_id: debt.debtor_id,
            debtor_phone_number: debt.debtor_phone_number,
            principal_amount: debt.principal_amount,
            interest_rate: debt.interest_rate,
            calculated_interest: debt.calculated_interest,
            total_amount: debt.total_amount,
            outstanding_balance: debt.outstanding_balance,
            due_date: debt.due_date,
            status,
            notes: debt.notes,
            is_external: debt.is_external,
            external_lender_name: debt.external_lender_name,
            paid_at: debt.paid_at,
            created_at: debt.created_at,
            updated_at: debt.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_flat_interest() {
        assert_eq!(calculate_interest(10000, 10.0), 1000);
        assert_eq!(calculate_interest(10000, 0.0), 0);
        assert_eq!(calculate_interest(10000, 100.0), 10000);
        // Rounded, not truncated
        assert_eq!(calculate_interest(1000, 2.55), 26);
    }

    #[test]
    fn test_effective_status_overlay() {
        let now = Utc::now();
        let mut debt = Debt {
            id: Uuid::new_v4(),
            lender_id: Uuid::new_v4(),
            debtor_id: None,
            debtor_phone_number: "+2348012345678".to_string(),
            principal_amount: 10000,
            interest_rate: 10.0,
            calculated_interest: 1000,
            total_amount: 11000,
            outstanding_balance: 11000,
            due_date: now + Duration::days(7),
            status: DebtStatus::Pending,
            notes: None,
            is_external: false,
            external_lender_name: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(debt.effective_status(now), DebtStatus::Pending);

        debt.due_date = now - Duration::days(1);
        assert_eq!(debt.effective_status(now), DebtStatus::Overdue);

        // Settled and defaulted debts never read as overdue
        debt.status = DebtStatus::Paid;
        assert_eq!(debt.effective_status(now), DebtStatus::Paid);
        debt.status = DebtStatus::Defaulted;
        assert_eq!(debt.effective_status(now), DebtStatus::Defaulted);
    }
}
