//! PostgreSQL store implementation
//!
//! Queries follow the schema in `migrations/`. Uniqueness violations are
//! recognized by constraint name and surfaced through the typed write
//! outcomes; every other database error is fatal for the operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    DebtStore, IdentityStore, IdentityWrite, PaymentStore, PaymentWrite, StoreError,
};
use crate::debt::{Debt, DebtStatus};
use crate::identity::Identity;
use crate::payment::{Payment, PaymentStatus};

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over a connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

/// Classify a unique-constraint violation on the `users` table.
fn identity_conflict(err: &sqlx::Error) -> Option<IdentityWrite> {
    let db = err.as_database_error()?;
    if db.code().as_deref() != Some("23505") {
        return None;
    }
    match db.constraint() {
        Some("users_pkey") => Some(IdentityWrite::ConflictOnId),
        Some("users_email_key") => Some(IdentityWrite::ConflictOnEmail),
        Some("users_phone_number_key") => Some(IdentityWrite::ConflictOnPhone),
        _ => None,
    }
}

fn payment_conflict(err: &sqlx::Error) -> Option<PaymentWrite> {
    let db = err.as_database_error()?;
    if db.code().as_deref() == Some("23505") && db.constraint() == Some("payments_reference_key")
    {
        Some(PaymentWrite::ConflictOnReference)
    } else {
        None
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_identity_by_phone(&self, phone: &str) -> Result<Option<Identity>, StoreError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM users WHERE phone_number = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<IdentityWrite, StoreError> {
        let result = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO users (id, name, email, phone_number, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(identity.id)
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(&identity.phone_number)
        .bind(&identity.avatar_url)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(IdentityWrite::Written(row)),
            Err(e) => identity_conflict(&e).ok_or_else(|| db_err(e)),
        }
    }

    async fn update_identity(&self, identity: &Identity) -> Result<IdentityWrite, StoreError> {
        let result = sqlx::query_as::<_, Identity>(
            r#"
            UPDATE users
            SET name = $2, email = $3, phone_number = $4, avatar_url = $5, updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(identity.id)
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(&identity.phone_number)
        .bind(&identity.avatar_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(IdentityWrite::Written(row)),
            Ok(None) => Err(StoreError::NotFound),
            Err(e) => identity_conflict(&e).ok_or_else(|| db_err(e)),
        }
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn identities_with_phone(&self) -> Result<Vec<(Uuid, String)>, StoreError> {
        sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, phone_number FROM users WHERE phone_number IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl DebtStore for PgStore {
    async fn insert_debt(&self, debt: &Debt) -> Result<Debt, StoreError> {
        sqlx::query_as::<_, Debt>(
            r#"
            INSERT INTO debts (
                id, lender_id, debtor_id, debtor_phone_number,
                principal_amount, interest_rate, calculated_interest,
                total_amount, outstanding_balance, due_date, status,
                notes, is_external, external_lender_name, paid_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(debt.id)
        .bind(debt.lender_id)
        .bind(debt.debtor_id)
        .bind(&debt.debtor_phone_number)
        .bind(debt.principal_amount)
        .bind(debt.interest_rate)
        .bind(debt.calculated_interest)
        .bind(debt.total_amount)
        .bind(debt.outstanding_balance)
        .bind(debt.due_date)
        .bind(debt.status)
        .bind(&debt.notes)
        .bind(debt.is_external)
        .bind(&debt.external_lender_name)
        .bind(debt.paid_at)
        .bind(debt.created_at)
        .bind(debt.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_debt_by_id(&self, id: Uuid) -> Result<Option<Debt>, StoreError> {
        sqlx::query_as::<_, Debt>("SELECT * FROM debts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn update_debt(&self, debt: &Debt) -> Result<Debt, StoreError> {
        sqlx::query_as::<_, Debt>(
            r#"
            UPDATE debts
            SET debtor_id = $2, debtor_phone_number = $3, principal_amount = $4,
                interest_rate = $5, calculated_interest = $6, total_amount = $7,
                outstanding_balance = $8, due_date = $9, status = $10, notes = $11,
                external_lender_name = $12, paid_at = $13, updated_at = $14
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(debt.id)
        .bind(debt.debtor_id)
        .bind(&debt.debtor_phone_number)
        .bind(debt.principal_amount)
        .bind(debt.interest_rate)
        .bind(debt.calculated_interest)
        .bind(debt.total_amount)
        .bind(debt.outstanding_balance)
        .bind(debt.due_date)
        .bind(debt.status)
        .bind(&debt.notes)
        .bind(&debt.external_lender_name)
        .bind(debt.paid_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_debt(&self, id: Uuid) -> Result<bool, StoreError> {
        // Payments cascade via the foreign key.
        let result = sqlx::query("DELETE FROM debts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_debts_for_party(
        &self,
        party_id: Uuid,
        status: Option<DebtStatus>,
    ) -> Result<Vec<Debt>, StoreError> {
        match status {
            Some(status) => sqlx::query_as::<_, Debt>(
                r#"
                SELECT * FROM debts
                WHERE (lender_id = $1 OR debtor_id = $1) AND status = $2
                ORDER BY created_at DESC
                "#,
            )
            .bind(party_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err),
            None => sqlx::query_as::<_, Debt>(
                r#"
                SELECT * FROM debts
                WHERE lender_id = $1 OR debtor_id = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(party_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err),
        }
    }

    async fn find_debts_by_phone_unlinked(&self, phone: &str) -> Result<Vec<Debt>, StoreError> {
        sqlx::query_as::<_, Debt>(
            "SELECT * FROM debts WHERE debtor_phone_number = $1 AND debtor_id IS NULL",
        )
        .bind(phone)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn batch_link_debts(&self, identity_id: Uuid, phone: &str) -> Result<u64, StoreError> {
        // The IS NULL predicate makes the batch idempotent and keeps two
        // concurrent sweeps from re-linking the same debt.
        let result = sqlx::query(
            r#"
            UPDATE debts
            SET debtor_id = $1, updated_at = $3
            WHERE debtor_phone_number = $2 AND debtor_id IS NULL
            "#,
        )
        .bind(identity_id)
        .bind(phone)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    async fn update_debt_balance(&self, debt_id: Uuid, amount: i64) -> Result<Debt, StoreError> {
        // Decrement, clamp, and flip in one statement so concurrent payments
        // never observe an intermediate balance.
        sqlx::query_as::<_, Debt>(
            r#"
            UPDATE debts
            SET outstanding_balance = GREATEST(outstanding_balance - $2, 0),
                status = CASE
                    WHEN outstanding_balance - $2 <= 0 THEN 'paid'::debt_status
                    ELSE status
                END,
                paid_at = CASE
                    WHEN outstanding_balance - $2 <= 0 THEN $3
                    ELSE paid_at
                END,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(debt_id)
        .bind(amount)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<PaymentWrite, StoreError> {
        let result = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, debt_id, amount, status, reference, gateway, notes,
                paid_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(payment.debt_id)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(&payment.reference)
        .bind(&payment.gateway)
        .bind(&payment.notes)
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(PaymentWrite::Written(row)),
            Err(e) => payment_conflict(&e).ok_or_else(|| db_err(e)),
        }
    }

    async fn settle_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Payment>, StoreError> {
        // The status guard mirrors the linking predicate: only one of two
        // racing callbacks settles the payment.
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, paid_at = $3, updated_at = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(paid_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn list_payments_for_debt(&self, debt_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE debt_id = $1 ORDER BY created_at DESC",
        )
        .bind(debt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}
