//! Fire-and-forget notification dispatch
//!
//! Debt-created, payment-received, and reminder events are posted to an
//! external notification dispatcher. Dispatch happens off the request path
//! and a failure to notify never fails or rolls back the operation that
//! triggered it; failures are logged and discarded.

use serde_json::json;

use crate::debt::Debt;
use crate::payment::Payment;

/// Handle to the external notification dispatcher
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl Notifier {
    /// Create a notifier posting to `base_url`, or a no-op one when the
    /// dispatcher is not configured.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// A notifier that drops every event. Used in tests.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn debt_created(&self, debt: &Debt) {
        self.dispatch(
            "debt.created",
            json!({
                "debt_id": debt.id,
                "lender_id": debt.lender_id,
                "debtor_id": debt.debtor_id,
                "debtor_phone_number": debt.debtor_phone_number,
                "total_amount": debt.total_amount,
                "due_date": debt.due_date,
            }),
        );
    }

    pub fn payment_received(&self, debt: &Debt, payment: &Payment) {
        self.dispatch(
            "payment.received",
            json!({
                "debt_id": debt.id,
                "payment_id": payment.id,
                "amount": payment.amount,
                "gateway": payment.gateway,
                "outstanding_balance": debt.outstanding_balance,
                "status": debt.status,
            }),
        );
    }

    pub fn payment_reminder(&self, debt: &Debt) {
        self.dispatch(
            "debt.reminder",
            json!({
                "debt_id": debt.id,
                "debtor_id": debt.debtor_id,
                "debtor_phone_number": debt.debtor_phone_number,
                "outstanding_balance": debt.outstanding_balance,
                "due_date": debt.due_date,
            }),
        );
    }

    fn dispatch(&self, event: &'static str, payload: serde_json::Value) {
        let Some(base_url) = self.base_url.clone() else {
            tracing::debug!(event, "Notifier not configured, dropping event");
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            let url = format!("{}/events", base_url.trim_end_matches('/'));
            let body = json!({ "event": event, "data": payload });

            match client.post(&url).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!(
                        event,
                        status = %resp.status(),
                        "Notification dispatch rejected"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(event, error = %e, "Notification dispatch failed");
                }
            }
        });
    }
}
