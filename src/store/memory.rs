//! In-memory store implementation
//!
//! A fake honoring the same contracts as [`super::PgStore`], used to test
//! the services in isolation. A single mutex stands in for the database's
//! serialization of writes, so the typed conflict outcomes and the guarded
//! batch predicates behave exactly as they do against Postgres.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    DebtStore, IdentityStore, IdentityWrite, PaymentStore, PaymentWrite, StoreError,
};
use crate::debt::{Debt, DebtStatus};
use crate::identity::Identity;
use crate::payment::{Payment, PaymentStatus};

#[derive(Default)]
struct MemInner {
    identities: HashMap<Uuid, Identity>,
    debts: HashMap<Uuid, Debt>,
    payments: HashMap<Uuid, Payment>,
}

/// In-memory store for isolated service tests
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemInner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl IdentityStore for MemStore {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.lock().identities.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .lock()
            .identities
            .values()
            .find(|i| i.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_identity_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .lock()
            .identities
            .values()
            .find(|i| i.phone_number.as_deref() == Some(phone))
            .cloned())
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<IdentityWrite, StoreError> {
        let mut inner = self.lock();

        if inner.identities.contains_key(&identity.id) {
            return Ok(IdentityWrite::ConflictOnId);
        }
        if let Some(email) = &identity.email {
            if inner
                .identities
                .values()
                .any(|i| i.email.as_deref() == Some(email))
            {
                return Ok(IdentityWrite::ConflictOnEmail);
            }
        }
        if let Some(phone) = &identity.phone_number {
            if inner
                .identities
                .values()
                .any(|i| i.phone_number.as_deref() == Some(phone))
            {
                return Ok(IdentityWrite::ConflictOnPhone);
            }
        }

        inner.identities.insert(identity.id, identity.clone());
        Ok(IdentityWrite::Written(identity.clone()))
    }

    async fn update_identity(&self, identity: &Identity) -> Result<IdentityWrite, StoreError> {
        let mut inner = self.lock();

        if !inner.identities.contains_key(&identity.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(email) = &identity.email {
            if inner
                .identities
                .values()
                .any(|i| i.id != identity.id && i.email.as_deref() == Some(email))
            {
                return Ok(IdentityWrite::ConflictOnEmail);
            }
        }
        if let Some(phone) = &identity.phone_number {
            if inner
                .identities
                .values()
                .any(|i| i.id != identity.id && i.phone_number.as_deref() == Some(phone))
            {
                return Ok(IdentityWrite::ConflictOnPhone);
            }
        }

        let mut updated = identity.clone();
        updated.updated_at = Utc::now();
        inner.identities.insert(updated.id, updated.clone());
        Ok(IdentityWrite::Written(updated))
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock();

        if inner.identities.remove(&id).is_none() {
            return Ok(false);
        }

        // Mirror the schema: lender debts (and their payments) cascade,
        // debtor links are cleared.
        let owned: Vec<Uuid> = inner
            .debts
            .values()
            .filter(|d| d.lender_id == id)
            .map(|d| d.id)
            .collect();
        for debt_id in owned {
            inner.debts.remove(&debt_id);
            inner.payments.retain(|_, p| p.debt_id != debt_id);
        }
        for debt in inner.debts.values_mut() {
            if debt.debtor_id == Some(id) {
                debt.debtor_id = None;
            }
        }

        Ok(true)
    }

    async fn identities_with_phone(&self) -> Result<Vec<(Uuid, String)>, StoreError> {
        Ok(self
            .lock()
            .identities
            .values()
            .filter_map(|i| i.phone_number.clone().map(|p| (i.id, p)))
            .collect())
    }
}

#[async_trait]
impl DebtStore for MemStore {
    async fn insert_debt(&self, debt: &Debt) -> Result<Debt, StoreError> {
        self.lock().debts.insert(debt.id, debt.clone());
        Ok(debt.clone())
    }

    async fn find_debt_by_id(&self, id: Uuid) -> Result<Option<Debt>, StoreError> {
        Ok(self.lock().debts.get(&id).cloned())
    }

    async fn update_debt(&self, debt: &Debt) -> Result<Debt, StoreError> {
        let mut inner = self.lock();

        if !inner.debts.contains_key(&debt.id) {
            return Err(StoreError::NotFound);
        }

        let mut updated = debt.clone();
        updated.updated_at = Utc::now();
        inner.debts.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_debt(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock();

        if inner.debts.remove(&id).is_none() {
            return Ok(false);
        }
        inner.payments.retain(|_, p| p.debt_id != id);
        Ok(true)
    }

    async fn list_debts_for_party(
        &self,
        party_id: Uuid,
        status: Option<DebtStatus>,
    ) -> Result<Vec<Debt>, StoreError> {
        let inner = self.lock();

        let mut debts: Vec<Debt> = inner
            .debts
            .values()
            .filter(|d| d.lender_id == party_id || d.debtor_id == Some(party_id))
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        debts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(debts)
    }

    async fn find_debts_by_phone_unlinked(&self, phone: &str) -> Result<Vec<Debt>, StoreError> {
        Ok(self
            .lock()
            .debts
            .values()
            .filter(|d| d.debtor_phone_number == phone && d.debtor_id.is_none())
            .cloned()
            .collect())
    }

    async fn batch_link_debts(&self, identity_id: Uuid, phone: &str) -> Result<u64, StoreError> {
        let mut inner = self.lock();

        let mut linked = 0;
        for debt in inner.debts.values_mut() {
            if debt.debtor_phone_number == phone && debt.debtor_id.is_none() {
                debt.debtor_id = Some(identity_id);
                debt.updated_at = Utc::now();
                linked += 1;
            }
        }
        Ok(linked)
    }

    async fn update_debt_balance(&self, debt_id: Uuid, amount: i64) -> Result<Debt, StoreError> {
        let mut inner = self.lock();

        let debt = inner.debts.get_mut(&debt_id).ok_or(StoreError::NotFound)?;
        let now = Utc::now();
        let remaining = debt.outstanding_balance - amount;
        debt.outstanding_balance = remaining.max(0);
        if remaining <= 0 {
            debt.status = DebtStatus::Paid;
            debt.paid_at = Some(now);
        }
        debt.updated_at = now;
        Ok(debt.clone())
    }
}

#[async_trait]
impl PaymentStore for MemStore {
    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .lock()
            .payments
            .values()
            .find(|p| p.reference == reference)
            .cloned())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<PaymentWrite, StoreError> {
        let mut inner = self.lock();

        if inner
            .payments
            .values()
            .any(|p| p.reference == payment.reference)
        {
            return Ok(PaymentWrite::ConflictOnReference);
        }

        inner.payments.insert(payment.id, payment.clone());
        Ok(PaymentWrite::Written(payment.clone()))
    }

    async fn settle_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Payment>, StoreError> {
        let mut inner = self.lock();

        let Some(payment) = inner.payments.get_mut(&id) else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }

        payment.status = status;
        payment.paid_at = paid_at;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn list_payments_for_debt(&self, debt_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let mut payments: Vec<Payment> = self
            .lock()
            .payments
            .values()
            .filter(|p| p.debt_id == debt_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}
