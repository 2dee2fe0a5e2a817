//! Identity models for the Tally backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Identity record for a registered user
///
/// `id` is stable and immutable; `email` and `phone_number` are each unique
/// across all identities while non-null.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields submitted by the authenticated caller
///
/// Every field is optional; omitted fields are left untouched on an existing
/// record. A brand-new profile requires at least a name.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone_number: Option<String>,
    #[validate(length(max = 2048))]
    pub avatar_url: Option<String>,
}

/// Public subset of an identity, safe to show to other users
#[derive(Debug, Serialize)]
pub struct PublicIdentity {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<Identity> for PublicIdentity {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
            avatar_url: identity.avatar_url,
        }
    }
}
