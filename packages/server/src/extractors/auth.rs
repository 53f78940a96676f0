use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use common::types::ApiKeyOwner;

use crate::error::ApiError;
use crate::middleware::auth::AuthContext;

/// Authenticated caller, populated by the auth middleware.
///
/// Add this as a handler parameter to access the key owner; role checks
/// happen via `require_publisher()` / `require_subscriber()` in the handler
/// body.
pub struct ApiKeyAuth(pub AuthContext);

impl ApiKeyAuth {
    /// Returns the publisher id, or 403 for subscriber keys.
    pub fn require_publisher(&self) -> Result<&str, ApiError> {
        match self.0.owner_type {
            ApiKeyOwner::Publisher => Ok(self.0.owner_id.as_str()),
            ApiKeyOwner::Subscriber => Err(ApiError::Forbidden(
                "publisher access required".to_string(),
            )),
        }
    }

    /// Returns the subscriber id, or 403 for publisher keys.
    pub fn require_subscriber(&self) -> Result<&str, ApiError> {
        match self.0.owner_type {
            ApiKeyOwner::Subscriber => Ok(self.0.owner_id.as_str()),
            ApiKeyOwner::Publisher => Err(ApiError::Forbidden(
                "subscriber access required".to_string(),
            )),
        }
    }
}

impl<S> FromRequestParts<S> for ApiKeyAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(ApiKeyAuth)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}
