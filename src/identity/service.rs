//! Profile service layer - Identity reconciliation
//!
//! Registration events can race with themselves (duplicate sign-up
//! deliveries) and with each other (a phone number already owned by another
//! identity). There is no locking here; the store's unique constraints are
//! the serialization point, and each recognized conflict is resolved with at
//! most one retry.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::identity::model::{Identity, ProfileInput};
use crate::identity::phone;
use crate::linking::LinkingService;
use crate::store::{IdentityWrite, SharedStore};

/// Profile service for identity create-or-update
pub struct ProfileService {
    store: SharedStore,
    linking: Arc<LinkingService>,
}

impl ProfileService {
    /// Create a new profile service instance
    pub fn new(store: SharedStore, linking: Arc<LinkingService>) -> Self {
        Self { store, linking }
    }

    /// Idempotent create-or-update of the caller's identity record.
    ///
    /// Insert conflicts resolve as: id taken -> another writer already
    /// materialized this identity, return theirs; email taken -> the email's
    /// owner is the identity, return it; phone taken -> the phone is dropped
    /// and the profile is created without it. One retry per conflict type,
    /// then the conflict surfaces.
    pub async fn create_or_update_profile(
        &self,
        caller: Uuid,
        input: ProfileInput,
    ) -> Result<Identity, ApiError> {
        input.validate()?;

        let phone_number = input
            .phone_number
            .as_deref()
            .map(phone::canonicalize)
            .transpose()
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        match self.store.find_identity_by_id(caller).await? {
            Some(existing) => {
                self.update_existing(existing, input, phone_number).await
            }
            None => self.insert_new(caller, input, phone_number).await,
        }
    }

    async fn update_existing(
        &self,
        mut identity: Identity,
        input: ProfileInput,
        phone_number: Option<String>,
    ) -> Result<Identity, ApiError> {
        let phone_changed =
            phone_number.is_some() && phone_number != identity.phone_number;

        if let Some(name) = input.name {
            identity.name = name;
        }
        if let Some(email) = input.email {
            identity.email = Some(email);
        }
        if let Some(avatar_url) = input.avatar_url {
            identity.avatar_url = Some(avatar_url);
        }
        if let Some(phone) = phone_number {
            identity.phone_number = Some(phone);
        }

        match self.store.update_identity(&identity).await? {
            IdentityWrite::Written(identity) => {
                if phone_changed {
                    if let Some(phone) = &identity.phone_number {
                        self.linking
                            .link_identity_to_existing_debts(identity.id, phone)
                            .await?;
                    }
                }
                Ok(identity)
            }
            IdentityWrite::ConflictOnEmail => Err(ApiError::Conflict(
                "Email is already in use by another account".to_string(),
            )),
            IdentityWrite::ConflictOnPhone => Err(ApiError::Conflict(
                "Phone number is already in use by another account".to_string(),
            )),
            IdentityWrite::ConflictOnId => Err(ApiError::Conflict(
                "Profile could not be updated".to_string(),
            )),
        }
    }

    async fn insert_new(
        &self,
        caller: Uuid,
        input: ProfileInput,
        phone_number: Option<String>,
    ) -> Result<Identity, ApiError> {
        let name = input.name.ok_or_else(|| {
            ApiError::Validation("Name is required for a new profile".to_string())
        })?;

        let now = Utc::now();
        let mut candidate = Identity {
            id: caller,
            name,
            email: input.email,
            phone_number,
            avatar_url: input.avatar_url,
            created_at: now,
            updated_at: now,
        };

        let mut retried_id = false;
        let mut retried_email = false;
        let mut dropped_phone = false;

        loop {
            match self.store.insert_identity(&candidate).await? {
                IdentityWrite::Written(identity) => {
                    tracing::info!(identity_id = %identity.id, "Profile created");
                    if let Some(phone) = &identity.phone_number {
                        self.linking
                            .link_identity_to_existing_debts(identity.id, phone)
                            .await?;
                    }
                    return Ok(identity);
                }
                IdentityWrite::ConflictOnId => {
                    if retried_id {
                        return Err(ApiError::Conflict(
                            "Profile already exists".to_string(),
                        ));
                    }
                    retried_id = true;

                    // Duplicate registration delivery; the other writer won.
                    if let Some(existing) =
                        self.store.find_identity_by_id(candidate.id).await?
                    {
                        return Ok(existing);
                    }
                    // The winner vanished before we could read it; one clean
                    // retry of the insert.
                }
                IdentityWrite::ConflictOnEmail => {
                    if retried_email {
                        return Err(ApiError::Conflict(
                            "Email is already in use by another account".to_string(),
                        ));
                    }
                    retried_email = true;

                    let email = candidate.email.as_deref().unwrap_or_default();
                    if let Some(owner) = self.store.find_identity_by_email(email).await? {
                        tracing::warn!(
                            identity_id = %candidate.id,
                            owner_id = %owner.id,
                            "Email already registered; returning its owner"
                        );
                        return Ok(owner);
                    }
                }
                IdentityWrite::ConflictOnPhone => {
                    if dropped_phone {
                        return Err(ApiError::Conflict(
                            "Phone number is already in use by another account".to_string(),
                        ));
                    }
                    dropped_phone = true;

                    tracing::warn!(
                        identity_id = %candidate.id,
                        "Phone number already owned by another identity; creating profile without it"
                    );
                    candidate.phone_number = None;
                }
            }
        }
    }

    /// Fetch an identity by id.
    pub async fn get_profile(&self, id: Uuid) -> Result<Identity, ApiError> {
        self.store
            .find_identity_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))
    }

    /// Explicit account deletion, owner only.
    pub async fn delete_profile(&self, id: Uuid) -> Result<(), ApiError> {
        if !self.store.delete_identity(id).await? {
            return Err(ApiError::NotFound("Profile not found".to_string()));
        }
        tracing::info!(identity_id = %id, "Profile deleted");
        Ok(())
    }
}
