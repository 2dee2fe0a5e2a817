//! Payment service layer - Business logic for applying payments to debts

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::debt::{Debt, DebtStatus};
use crate::error::ApiError;
use crate::payment::model::{
    GatewayCallback, InitiatePaymentRequest, Payment, PaymentStatus, RecordPaymentRequest,
    MANUAL_GATEWAY,
};
use crate::notifier::Notifier;
use crate::store::{PaymentWrite, SharedStore};

/// Payment service for recording and applying payments
pub struct PaymentService {
    store: SharedStore,
    notifier: Notifier,
}

impl PaymentService {
    /// Create a new payment service instance
    pub fn new(store: SharedStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    async fn open_debt(&self, debt_id: Uuid) -> Result<Debt, ApiError> {
        let debt = self
            .store
            .find_debt_by_id(debt_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Debt not found".to_string()))?;

        if debt.status != DebtStatus::Pending {
            return Err(ApiError::Validation(
                "Debt is not open for payments".to_string(),
            ));
        }
        Ok(debt)
    }

    fn check_amount(debt: &Debt, amount: i64) -> Result<(), ApiError> {
        if amount <= 0 {
            return Err(ApiError::Validation(
                "Payment amount must be positive".to_string(),
            ));
        }
        if amount > debt.outstanding_balance {
            return Err(ApiError::Validation(format!(
                "Payment of {} exceeds the outstanding balance of {}",
                amount, debt.outstanding_balance
            )));
        }
        Ok(())
    }

    /// Record a cash or transfer payment the lender received outside any
    /// gateway. Applied immediately.
    pub async fn record_payment(
        &self,
        debt_id: Uuid,
        caller: Uuid,
        request: RecordPaymentRequest,
    ) -> Result<Payment, ApiError> {
        request.validate()?;

        let debt = self.open_debt(debt_id).await?;
        if debt.lender_id != caller {
            return Err(ApiError::Forbidden(
                "Only the lender may record payments".to_string(),
            ));
        }
        Self::check_amount(&debt, request.amount)?;

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            debt_id,
            amount: request.amount,
            status: PaymentStatus::Successful,
            reference: format!("manual_{}", Uuid::new_v4().simple()),
            gateway: MANUAL_GATEWAY.to_string(),
            notes: request.notes,
            paid_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        let payment = match self.store.insert_payment(&payment).await? {
            PaymentWrite::Written(payment) => payment,
            PaymentWrite::ConflictOnReference => {
                return Err(ApiError::Conflict(
                    "Payment reference already exists".to_string(),
                ));
            }
        };

        let debt = self.store.update_debt_balance(debt_id, payment.amount).await?;
        tracing::info!(
            debt_id = %debt_id,
            payment_id = %payment.id,
            amount = payment.amount,
            outstanding_balance = debt.outstanding_balance,
            "Manual payment recorded"
        );
        self.notifier.payment_received(&debt, &payment);

        Ok(payment)
    }

    /// Open a gateway payment for a debt. The checkout itself happens
    /// outside this service; the callback settles the row by reference.
    pub async fn initiate_gateway_payment(
        &self,
        caller: Uuid,
        request: InitiatePaymentRequest,
    ) -> Result<Payment, ApiError> {
        request.validate()?;

        let debt = self.open_debt(request.debt_id).await?;
        if debt.lender_id != caller && debt.debtor_id != Some(caller) {
            return Err(ApiError::Forbidden(
                "Not a party to this debt".to_string(),
            ));
        }
        Self::check_amount(&debt, request.amount)?;

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            debt_id: request.debt_id,
            amount: request.amount,
            status: PaymentStatus::Pending,
            reference: format!("tly_{}", Uuid::new_v4().simple()),
            gateway: request.gateway,
            notes: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_payment(&payment).await? {
            PaymentWrite::Written(payment) => {
                tracing::info!(
                    debt_id = %payment.debt_id,
                    reference = %payment.reference,
                    "Gateway payment initiated"
                );
                Ok(payment)
            }
            PaymentWrite::ConflictOnReference => Err(ApiError::Conflict(
                "Payment reference already exists".to_string(),
            )),
        }
    }

    /// Apply a gateway's report for a payment reference.
    ///
    /// Idempotent per reference: a settled reference is a no-op success, a
    /// pending one is settled exactly once (two racing callbacks cannot both
    /// decrement the balance), and an unknown one is recorded from the
    /// callback when it names the debt. A failed payment never touches the
    /// debt.
    pub async fn apply_gateway_payment(
        &self,
        callback: GatewayCallback,
    ) -> Result<Payment, ApiError> {
        if callback.amount <= 0 {
            return Err(ApiError::Validation(
                "Payment amount must be positive".to_string(),
            ));
        }

        match self
            .store
            .find_payment_by_reference(&callback.reference)
            .await?
        {
            Some(payment) if payment.status != PaymentStatus::Pending => {
                tracing::debug!(
                    reference = %payment.reference,
                    "Repeated gateway callback for a settled payment"
                );
                Ok(payment)
            }
            Some(payment) => self.settle_pending(payment, callback).await,
            None => self.record_unseen(callback).await,
        }
    }

    async fn settle_pending(
        &self,
        payment: Payment,
        callback: GatewayCallback,
    ) -> Result<Payment, ApiError> {
        match callback.status {
            PaymentStatus::Pending => Ok(payment),
            PaymentStatus::Failed => {
                let settled = self
                    .store
                    .settle_payment(payment.id, PaymentStatus::Failed, None)
                    .await?;
                tracing::info!(reference = %payment.reference, "Gateway payment failed");
                Ok(settled.unwrap_or(payment))
            }
            PaymentStatus::Successful => {
                if callback.amount != payment.amount {
                    return Err(ApiError::Validation(
                        "Amount does not match the initiated payment".to_string(),
                    ));
                }

                let debt = self.open_debt(payment.debt_id).await?;
                Self::check_amount(&debt, payment.amount)?;

                let Some(settled) = self
                    .store
                    .settle_payment(payment.id, PaymentStatus::Successful, Some(Utc::now()))
                    .await?
                else {
                    // A concurrent callback settled it first; the balance has
                    // already been applied exactly once.
                    return Ok(self
                        .store
                        .find_payment_by_reference(&payment.reference)
                        .await?
                        .unwrap_or(payment));
                };

                let debt = self
                    .store
                    .update_debt_balance(settled.debt_id, settled.amount)
                    .await?;
                tracing::info!(
                    debt_id = %settled.debt_id,
                    reference = %settled.reference,
                    amount = settled.amount,
                    outstanding_balance = debt.outstanding_balance,
                    "Gateway payment applied"
                );
                self.notifier.payment_received(&debt, &settled);
                Ok(settled)
            }
        }
    }

    async fn record_unseen(&self, callback: GatewayCallback) -> Result<Payment, ApiError> {
        let debt_id = callback.debt_id.ok_or_else(|| {
            ApiError::NotFound("Unknown payment reference".to_string())
        })?;

        let successful = callback.status == PaymentStatus::Successful;
        let debt = self.open_debt(debt_id).await?;
        if successful {
            Self::check_amount(&debt, callback.amount)?;
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            debt_id,
            amount: callback.amount,
            status: callback.status,
            reference: callback.reference.clone(),
            gateway: callback
                .gateway
                .unwrap_or_else(|| "gateway".to_string()),
            notes: None,
            paid_at: successful.then_some(now),
            created_at: now,
            updated_at: now,
        };

        let payment = match self.store.insert_payment(&payment).await? {
            PaymentWrite::Written(payment) => payment,
            PaymentWrite::ConflictOnReference => {
                // A concurrent callback recorded the reference first; that
                // delivery owns the balance application.
                return Ok(self
                    .store
                    .find_payment_by_reference(&callback.reference)
                    .await?
                    .ok_or_else(|| {
                        ApiError::Conflict("Payment reference already exists".to_string())
                    })?);
            }
        };

        if successful {
            let debt = self
                .store
                .update_debt_balance(debt_id, payment.amount)
                .await?;
            tracing::info!(
                debt_id = %debt_id,
                reference = %payment.reference,
                amount = payment.amount,
                outstanding_balance = debt.outstanding_balance,
                "Gateway payment applied"
            );
            self.notifier.payment_received(&debt, &payment);
        }

        Ok(payment)
    }

    /// List a debt's payments. Readable by either party.
    pub async fn list_payments(
        &self,
        debt_id: Uuid,
        caller: Uuid,
    ) -> Result<Vec<Payment>, ApiError> {
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

        Ok(self.store.list_payments_for_debt(debt_id).await?)
    }
}
