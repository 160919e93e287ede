//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use carpool_common::AppError;
use carpool_db::entities::user;

/// Authenticated, accepted user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        let user = parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .ok_or(AppError::Unauthorized)?;

        if !user.is_accepted {
            return Err(AppError::Forbidden(
                "Your account has not been accepted yet".to_string(),
            ));
        }

        Ok(Self(user))
    }
}
