//! Identity linking service
//!
//! Debts are recorded against a canonical phone number before the named
//! person has an account. This service matches in both directions: a new
//! debt to an already-registered identity, and a newly-known phone number to
//! every debt waiting on it. Linking is monotonic; a debtor link, once set,
//! is never rewritten.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::ApiError;
use crate::store::SharedStore;

/// Service matching debts to identities by canonical phone number
pub struct LinkingService {
    store: SharedStore,
}

impl LinkingService {
    /// Create a new linking service instance
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Resolve a debtor phone number to a registered identity, if any.
    ///
    /// Called at debt-creation time. No match is an expected, common outcome
    /// and never an error; the debt stays discoverable through its phone
    /// number alone.
    pub async fn resolve_debtor(&self, phone: &str) -> Result<Option<Uuid>, ApiError> {
        let identity = self.store.find_identity_by_phone(phone).await?;
        Ok(identity.map(|i| i.id))
    }

    /// Attach every unlinked debt bearing `phone` to the identity.
    ///
    /// Called whenever an identity's phone number becomes known. Idempotent
    /// and safe to re-run: the batch update only touches debts with no
    /// debtor yet, so concurrent invocations (duplicate webhook retries,
    /// overlapping sweeps) each link a debt at most once between them.
    pub async fn link_identity_to_existing_debts(
        &self,
        identity_id: Uuid,
        phone: &str,
    ) -> Result<u64, ApiError> {
        let waiting = self.store.find_debts_by_phone_unlinked(phone).await?;
        if waiting.is_empty() {
            return Ok(0);
        }

        let linked = self.store.batch_link_debts(identity_id, phone).await?;
        if linked > 0 {
            tracing::info!(
                identity_id = %identity_id,
                linked,
                "Attached unlinked debts to identity"
            );
        }
        Ok(linked)
    }

    /// Reconciliation pass over every identity with a known phone number.
    ///
    /// Batch maintenance, not the hot path; registration and profile edits
    /// trigger the per-identity link directly.
    pub async fn link_all_unlinked_debts(&self) -> Result<u64, ApiError> {
        let holders = self.store.identities_with_phone().await?;

        let mut total = 0;
        for (identity_id, phone) in holders {
            total += self
                .link_identity_to_existing_debts(identity_id, &phone)
                .await?;
        }
        Ok(total)
    }
}

/// Periodic reconciliation sweep, run as a background task.
pub async fn linking_sweep(service: Arc<LinkingService>, interval_secs: u64) {
    tracing::info!("Starting identity linking sweep");

    loop {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;

        match service.link_all_unlinked_debts().await {
            Ok(0) => {}
            Ok(linked) => {
                tracing::info!(linked, "Linking sweep attached debts");
            }
            Err(e) => {
                tracing::error!("Error running linking sweep: {}", e);
            }
        }
    }
}
