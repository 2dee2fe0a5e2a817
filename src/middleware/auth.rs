//! Authenticated caller extraction
//!
//! Credential verification is delegated to the upstream identity provider;
//! by the time a request reaches this service the provider has verified the
//! caller and forwarded their identity id in the `x-user-id` header.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::ApiError;

/// Identity id of the authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized("Missing caller identity header".to_string())
            })?;

        let user_id = Uuid::parse_str(raw).map_err(|_| {
            ApiError::Unauthorized("Malformed caller identity header".to_string())
        })?;

        Ok(AuthenticatedUser { user_id })
    }
}
