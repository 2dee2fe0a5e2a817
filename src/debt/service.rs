//! Debt service layer - Business logic for the debt ledger

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::debt::model::{
    calculate_interest, CreateDebtRequest, Debt, DebtStatus, UpdateDebtRequest,
};
use crate::error::ApiError;
use crate::identity::phone;
use crate::linking::LinkingService;
use crate::notifier::Notifier;
use crate::store::SharedStore;

/// Principal bounds a debt may be created with
#[derive(Debug, Clone, Copy)]
pub struct DebtLimits {
    pub min_amount: i64,
    pub max_amount: i64,
}

impl Default for DebtLimits {
    fn default() -> Self {
        Self {
            min_amount: 1,
            max_amount: 100_000_000,
        }
    }
}

/// Debt service for managing the debt lifecycle
pub struct DebtService {
    store: SharedStore,
    linking: Arc<LinkingService>,
    notifier: Notifier,
    limits: DebtLimits,
}

impl DebtService {
    /// Create a new debt service instance
    pub fn new(
        store: SharedStore,
        linking: Arc<LinkingService>,
        notifier: Notifier,
        limits: DebtLimits,
    ) -> Self {
        Self {
            store,
            linking,
            notifier,
            limits,
        }
    }

    fn check_principal(&self, principal: i64) -> Result<(), ApiError> {
        if principal < self.limits.min_amount || principal > self.limits.max_amount {
            return Err(ApiError::Validation(format!(
                "Principal must be between {} and {}",
                self.limits.min_amount, self.limits.max_amount
            )));
        }
        Ok(())
    }

    /// Create a debt against a phone number
    ///
    /// Validates, computes totals, and resolves the phone to a registered
    /// debtor when one exists. Nothing is written on a validation failure.
    pub async fn create_debt(
        &self,
        lender_id: Uuid,
        request: CreateDebtRequest,
    ) -> Result<Debt, ApiError> {
        request.validate()?;
        self.check_principal(request.principal_amount)?;

        let debtor_phone = phone::canonicalize(&request.debtor_phone_number)
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        let now = Utc::now();
        if request.due_date <= now {
            return Err(ApiError::Validation(
                "Due date must be in the future".to_string(),
            ));
        }
        if request.is_external && request.external_lender_name.is_none() {
            return Err(ApiError::Validation(
                "External debts require the external lender's name".to_string(),
            ));
        }

        self.store
            .find_identity_by_id(lender_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Lender profile not found".to_string()))?;

        let debtor_id = self.linking.resolve_debtor(&debtor_phone).await?;

        let calculated_interest =
            calculate_interest(request.principal_amount, request.interest_rate);
        let total_amount = request.principal_amount + calculated_interest;

        let debt = Debt {
            id: Uuid::new_v4(),
            lender_id,
            debtor_id,
            debtor_phone_number: debtor_phone,
            principal_amount: request.principal_amount,
            interest_rate: request.interest_rate,
            calculated_interest,
            total_amount,
            outstanding_balance: total_amount,
            due_date: request.due_date,
            status: DebtStatus::Pending,
            notes: request.notes,
            is_external: request.is_external,
            external_lender_name: request.external_lender_name,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        let debt = self.store.insert_debt(&debt).await?;

        tracing::info!(
            debt_id = %debt.id,
            lender_id = %debt.lender_id,
            linked = debt.debtor_id.is_some(),
            total_amount = debt.total_amount,
            "Debt created"
        );
        self.notifier.debt_created(&debt);

        Ok(debt)
    }

    /// Edit a debt
    ///
    /// While pending, the financial fields are editable and totals are
    /// recomputed exactly as on creation. Once settled or defaulted, only
    /// notes and due-date metadata may change.
    pub async fn edit_debt(
        &self,
        debt_id: Uuid,
        caller: Uuid,
        request: UpdateDebtRequest,
    ) -> Result<Debt, ApiError> {
        request.validate()?;

        let mut debt = self
            .store
            .find_debt_by_id(debt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Debt not found".to_string()))?;

        if debt.lender_id != caller {
            return Err(ApiError::Forbidden(
                "Only the lender may edit a debt".to_string(),
            ));
        }

        match debt.status {
            DebtStatus::Pending => {
                if let Some(principal) = request.principal_amount {
                    self.check_principal(principal)?;
                    debt.principal_amount = principal;
                }
                if let Some(rate) = request.interest_rate {
                    debt.interest_rate = rate;
                }
                if let Some(due_date) = request.due_date {
                    if due_date <= Utc::now() {
                        return Err(ApiError::Validation(
                            "Due date must be in the future".to_string(),
                        ));
                    }
                    debt.due_date = due_date;
                }
                if let Some(raw_phone) = &request.debtor_phone_number {
                    let new_phone = phone::canonicalize(raw_phone)
                        .map_err(|e| ApiError::Validation(e.to_string()))?;
                    if new_phone != debt.debtor_phone_number {
                        debt.debtor_phone_number = new_phone;
                        // Linking is monotonic; an already-linked debt keeps
                        // its debtor even when the phone is corrected.
                        if debt.debtor_id.is_none() {
                            debt.debtor_id =
                                self.linking.resolve_debtor(&debt.debtor_phone_number).await?;
                        }
                    }
                }
                if let Some(notes) = request.notes {
                    debt.notes = Some(notes);
                }
                if let Some(name) = request.external_lender_name {
                    debt.external_lender_name = Some(name);
                }

                debt.calculated_interest =
                    calculate_interest(debt.principal_amount, debt.interest_rate);
                let new_total = debt.principal_amount + debt.calculated_interest;
                if new_total != debt.total_amount {
                    // Payments already applied are not reconciled against the
                    // new figure; the balance restarts from the new total.
                    debt.total_amount = new_total;
                    debt.outstanding_balance = new_total;
                }
            }
            DebtStatus::Paid | DebtStatus::Defaulted | DebtStatus::Overdue => {
                if request.principal_amount.is_some()
                    || request.interest_rate.is_some()
                    || request.debtor_phone_number.is_some()
                {
                    return Err(ApiError::Validation(
                        "Principal, rate, and phone are locked once a debt is settled"
                            .to_string(),
                    ));
                }
                if let Some(due_date) = request.due_date {
                    debt.due_date = due_date;
                }
                if let Some(notes) = request.notes {
                    debt.notes = Some(notes);
                }
                if let Some(name) = request.external_lender_name {
                    debt.external_lender_name = Some(name);
                }
            }
        }

        let debt = self.store.update_debt(&debt).await?;
        tracing::info!(debt_id = %debt.id, "Debt updated");
        Ok(debt)
    }

    /// Get a debt. Readable by its lender or its linked debtor only.
    pub async fn get_debt(&self, debt_id: Uuid, caller: Uuid) -> Result<Debt, ApiError> {
        let debt = self
            .store
            .find_debt_by_id(debt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Debt not found".to_string()))?;

        if debt.lender_id != caller && debt.debtor_id != Some(caller) {
            return Err(ApiError::Forbidden(
                "Not a party to this debt".to_string(),
            ));
        }

        Ok(debt)
    }

    /// List the caller's debts, on either side of the ledger.
    ///
    /// Overdue is never stored, so filtering on it (or on pending) splits the
    /// pending rows by the read-time overlay.
    pub async fn list_debts(
        &self,
        caller: Uuid,
        status: Option<DebtStatus>,
    ) -> Result<Vec<Debt>, ApiError> {
        let debts = match status {
            Some(wanted @ (DebtStatus::Pending | DebtStatus::Overdue)) => {
                let now = Utc::now();
                self.store
                    .list_debts_for_party(caller, Some(DebtStatus::Pending))
                    .await?
                    .into_iter()
                    .filter(|d| d.effective_status(now) == wanted)
                    .collect()
            }
            other => self.store.list_debts_for_party(caller, other).await?,
        };
        Ok(debts)
    }

    /// Mark a pending debt uncollectible. Irreversible.
    pub async fn mark_defaulted(&self, debt_id: Uuid, caller: Uuid) -> Result<Debt, ApiError> {
        let mut debt = self
            .store
            .find_debt_by_id(debt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Debt not found".to_string()))?;

        if debt.lender_id != caller {
            return Err(ApiError::Forbidden(
                "Only the lender may mark a debt as defaulted".to_string(),
            ));
        }
        if debt.status != DebtStatus::Pending {
            return Err(ApiError::Validation(
                "Only pending debts can be marked as defaulted".to_string(),
            ));
        }

        debt.status = DebtStatus::Defaulted;
        let debt = self.store.update_debt(&debt).await?;
        tracing::info!(debt_id = %debt.id, "Debt marked as defaulted");
        Ok(debt)
    }

    /// Delete a debt and its payments together. Irreversible.
    pub async fn delete_debt(&self, debt_id: Uuid, caller: Uuid) -> Result<(), ApiError> {
        let debt = self
            .store
            .find_debt_by_id(debt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Debt not found".to_string()))?;

        if debt.lender_id != caller {
            return Err(ApiError::Forbidden(
                "Only the lender may delete a debt".to_string(),
            ));
        }

        self.store.delete_debt(debt_id).await?;
        tracing::info!(debt_id = %debt_id, "Debt deleted");
        Ok(())
    }

    /// Send a payment reminder to the debtor. Fire-and-forget.
    pub async fn send_reminder(&self, debt_id: Uuid, caller: Uuid) -> Result<(), ApiError> {
        let debt = self
            .store
            .find_debt_by_id(debt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Debt not found".to_string()))?;

        if debt.lender_id != caller {
            return Err(ApiError::Forbidden(
                "Only the lender may send reminders".to_string(),
            ));
        }

        self.notifier.payment_reminder(&debt);
        Ok(())
    }
}
