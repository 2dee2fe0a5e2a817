//! Store layer for the Tally backend
//!
//! Persistence is expressed as narrow repository traits so the services stay
//! testable against an in-memory fake. Uniqueness conflicts are part of the
//! contract (typed write outcomes), not raw driver errors: the database's
//! unique constraints are the only serialization point for concurrent
//! identity writes and payment applications.

mod memory;
mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::debt::{Debt, DebtStatus};
use crate::identity::Identity;
use crate::payment::{Payment, PaymentStatus};

/// Store failure
///
/// Anything other than a recognized uniqueness violation (reported through
/// the typed write outcomes) is fatal for the running operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("store error: {0}")]
    Database(String),
}

/// Outcome of an identity insert or update
#[derive(Debug)]
pub enum IdentityWrite {
    Written(Identity),
    ConflictOnId,
    ConflictOnEmail,
    ConflictOnPhone,
}

/// Outcome of a payment insert
#[derive(Debug)]
pub enum PaymentWrite {
    Written(Payment),
    ConflictOnReference,
}

/// Identity persistence
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError>;

    async fn insert_identity(&self, identity: &Identity) -> Result<IdentityWrite, StoreError>;

    /// Update the mutable fields of an existing identity, keyed by its id.
    async fn update_identity(&self, identity: &Identity) -> Result<IdentityWrite, StoreError>;

    /// Returns whether a record was deleted.
    async fn delete_identity(&self, id: Uuid) -> Result<bool, StoreError>;

    /// `(id, phone)` of every identity with a known phone number, for the
    /// reconciliation sweep.
    async fn identities_with_phone(&self) -> Result<Vec<(Uuid, String)>, StoreError>;
}

/// Debt persistence
#[async_trait]
pub trait DebtStore: Send + Sync {
    async fn insert_debt(&self, debt: &Debt) -> Result<Debt, StoreError>;

    async fn find_debt_by_id(&self, id: Uuid) -> Result<Option<Debt>, StoreError>;

    async fn update_debt(&self, debt: &Debt) -> Result<Debt, StoreError>;

    /// Removes the debt and its payments together. Returns whether a record
    /// was deleted.
    async fn delete_debt(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Debts where `party_id` is the lender or the linked debtor.
    async fn list_debts_for_party(
        &self,
        party_id: Uuid,
        status: Option<DebtStatus>,
    ) -> Result<Vec<Debt>, StoreError>;

    async fn find_debts_by_phone_unlinked(&self, phone: &str) -> Result<Vec<Debt>, StoreError>;

    /// Attach every unlinked debt bearing `phone` to `identity_id` in one
    /// batch. The `debtor_id IS NULL` predicate is the guard that keeps the
    /// operation idempotent and safe under concurrent invocation. Returns
    /// the number of debts linked.
    async fn batch_link_debts(&self, identity_id: Uuid, phone: &str) -> Result<u64, StoreError>;

    /// Atomically decrement the outstanding balance, clamping at zero and
    /// flipping the debt to PAID (with `paid_at`) when it reaches zero.
    async fn update_debt_balance(&self, debt_id: Uuid, amount: i64) -> Result<Debt, StoreError>;
}

/// Payment persistence
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError>;

    async fn insert_payment(&self, payment: &Payment) -> Result<PaymentWrite, StoreError>;

    /// Settle a pending payment to its final status. Returns `None` when the
    /// payment was not pending anymore, which is the guard against two
    /// concurrent callbacks applying the same reference twice.
    async fn settle_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Payment>, StoreError>;

    async fn list_payments_for_debt(&self, debt_id: Uuid) -> Result<Vec<Payment>, StoreError>;
}

/// The full persistence contract services are constructed with
pub trait Store: IdentityStore + DebtStore + PaymentStore {}

impl<T: IdentityStore + DebtStore + PaymentStore> Store for T {}

/// Shared handle to a store implementation
pub type SharedStore = Arc<dyn Store>;
